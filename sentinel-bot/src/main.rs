use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use sentinel_core::DifyClient;

use sentinel_bot::config::Config;
use sentinel_bot::directory::ChatUserId;
use sentinel_bot::engine::Engine;
use sentinel_bot::github::GitHubClient;
use sentinel_bot::mail::{HttpMailer, MailSender};
use sentinel_bot::notify::SlackWebhook;
use sentinel_bot::store::SqliteStore;

/// Sentinel: pull-request tracking and notification bot
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(about = "Polls GitHub pull requests and notifies Slack on state changes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass: discover new PRs, sync tracking rows,
    /// and notify on state changes
    Reconcile,
    /// Check every tracked PR for merge conflicts and remind the authors
    InspectConflicts,
    /// Summarize the diffs of not-yet-reviewed PRs and post the summaries
    /// as PR comments
    Review,
    /// Map a GitHub account to a Slack user id for mentions
    AddMapping {
        github_account: String,
        chat_user_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!("Failed to load configuration from environment variables: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    let db_path = config.state_dir.join("sentinel.db");
    info!("Using state database: {}", db_path.display());
    let store = match SqliteStore::new(&db_path) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            error!("Failed to initialize SQLite database: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    let mailer = Arc::new(HttpMailer::new(
        config.mail_endpoint.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    ));

    let engine = Engine {
        source: Arc::new(GitHubClient::new(config.github_token.clone())),
        table: store.clone(),
        directory: store.clone(),
        notifier: Arc::new(SlackWebhook::new(config.slack_webhook_url.clone())),
        mailer: mailer.clone(),
        summarizer: Arc::new(DifyClient::new(
            config.dify_endpoint.clone(),
            config.dify_api_key.clone(),
            config.dify_user.clone(),
        )),
        github_owner: config.github_owner.clone(),
        repositories: config.repositories.clone(),
        operator_email: config.operator_email.clone(),
        policy: config.policy,
    };

    let (pass_name, result) = match cli.command {
        Commands::Reconcile => ("reconciliation", engine.run_reconciliation().await),
        Commands::InspectConflicts => ("conflict inspection", engine.inspect_conflicts().await),
        Commands::Review => ("review", engine.run_review_pass().await),
        Commands::AddMapping {
            github_account,
            chat_user_id,
        } => return add_mapping(&store, &github_account, &chat_user_id).await,
    };

    match result {
        Ok(()) => {
            info!("{pass_name} pass completed");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{pass_name} pass failed: {error:#}");
            let subject = format!("[sentinel] Error occurred during the {pass_name} pass");
            let body = format!("The {pass_name} pass failed: {error:#}");
            if let Err(mail_error) = mailer.send(&subject, &body, &config.operator_email).await {
                error!("Failed to send operator email: {mail_error:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn add_mapping(store: &SqliteStore, github_account: &str, chat_user_id: &str) -> ExitCode {
    if ChatUserId::parse(chat_user_id).is_none() {
        error!("{chat_user_id:?} does not look like a valid Slack user id (expected U + 10 uppercase alphanumerics); the mapping would be ignored at notification time");
        return ExitCode::FAILURE;
    }

    match store.upsert_mapping(github_account, chat_user_id).await {
        Ok(()) => {
            info!("Mapped GitHub account {github_account} to {chat_user_id}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("Failed to store mapping: {error:#}");
            ExitCode::FAILURE
        }
    }
}
