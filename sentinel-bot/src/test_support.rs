//! Shared fakes for engine tests: a scripted pull-request source and
//! recording implementations of the outbound collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sentinel_core::{Summarizer, SummarizerError};

use crate::config::Policy;
use crate::directory::{ChatUserId, InMemoryDirectory};
use crate::engine::Engine;
use crate::github::{
    Account, BranchRef, ChangedFile, IssueComment, PullRequest, PullRequestSource, ReviewComment,
};
use crate::locator::PullRequestLocator;
use crate::mail::MailSender;
use crate::notify::Notifier;
use crate::store::{InMemoryStore, TrackedRow};

/// Build an open, mergeable pull request with no requested reviewers.
pub fn open_pull_request(url: &str, author: &str) -> PullRequest {
    PullRequest {
        state: "open".to_string(),
        merged: false,
        mergeable: Some(true),
        user: Account {
            login: author.to_string(),
        },
        requested_reviewers: Vec::new(),
        base: BranchRef {
            ref_name: "main".to_string(),
        },
        head: BranchRef {
            ref_name: "feature".to_string(),
        },
        html_url: url.to_string(),
    }
}

fn key(url: &str) -> String {
    PullRequestLocator::parse(url)
        .expect("test URL must be a valid PR URL")
        .to_string()
}

#[derive(Debug, Clone)]
pub struct CreatedComment {
    pub locator: String,
    pub body: String,
}

/// Scripted `PullRequestSource`: responses are registered per repository or
/// per PR URL, and writes are recorded.
#[derive(Default)]
pub struct FakeSource {
    open: Mutex<HashMap<String, Vec<PullRequest>>>,
    failing_repos: Mutex<HashSet<String>>,
    details: Mutex<HashMap<String, PullRequest>>,
    comments: Mutex<HashMap<String, Vec<ReviewComment>>>,
    files: Mutex<HashMap<String, Vec<ChangedFile>>>,
    created: Mutex<Vec<CreatedComment>>,
    next_comment_id: AtomicU64,
    comment_fetch_count: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            next_comment_id: AtomicU64::new(9000),
            ..Self::default()
        }
    }

    pub fn set_open_pull_requests(&self, repo: &str, pull_requests: Vec<PullRequest>) {
        self.open
            .lock()
            .unwrap()
            .insert(repo.to_string(), pull_requests);
    }

    pub fn fail_repository(&self, repo: &str) {
        self.failing_repos.lock().unwrap().insert(repo.to_string());
    }

    pub fn set_pull_request(&self, url: &str, pr: PullRequest) {
        self.details.lock().unwrap().insert(key(url), pr);
    }

    pub fn set_review_comments(&self, url: &str, comments: Vec<ReviewComment>) {
        self.comments.lock().unwrap().insert(key(url), comments);
    }

    pub fn set_changed_files(&self, url: &str, files: Vec<ChangedFile>) {
        self.files.lock().unwrap().insert(key(url), files);
    }

    pub fn created_comments(&self) -> Vec<CreatedComment> {
        self.created.lock().unwrap().clone()
    }

    pub fn comment_fetches(&self) -> usize {
        self.comment_fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullRequestSource for FakeSource {
    async fn list_open_pull_requests(&self, _owner: &str, repo: &str) -> Result<Vec<PullRequest>> {
        if self.failing_repos.lock().unwrap().contains(repo) {
            return Err(anyhow!("scripted failure for repository {repo}"));
        }
        Ok(self
            .open
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_pull_request(&self, locator: &PullRequestLocator) -> Result<PullRequest> {
        self.details
            .lock()
            .unwrap()
            .get(&locator.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("no scripted detail for {locator}"))
    }

    async fn list_review_comments(
        &self,
        locator: &PullRequestLocator,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReviewComment>> {
        self.comment_fetch_count.fetch_add(1, Ordering::SeqCst);
        // `since` is deliberately ignored: the fake always returns the full
        // comment set, simulating an overlapping fetch window.
        Ok(self
            .comments
            .lock()
            .unwrap()
            .get(&locator.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn list_changed_files(&self, locator: &PullRequestLocator) -> Result<Vec<ChangedFile>> {
        self.files
            .lock()
            .unwrap()
            .get(&locator.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("no scripted files for {locator}"))
    }

    async fn create_issue_comment(
        &self,
        locator: &PullRequestLocator,
        body: &str,
    ) -> Result<IssueComment> {
        let id = self.next_comment_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(CreatedComment {
            locator: locator.to_string(),
            body: body.to_string(),
        });
        Ok(IssueComment { id })
    }

    async fn update_issue_comment(
        &self,
        _owner: &str,
        _repo: &str,
        _comment_id: u64,
        _body: &str,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub message: String,
    pub mention: Option<String>,
    pub link: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    posts: Mutex<Vec<RecordedPost>>,
}

impl RecordingNotifier {
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, message: &str, mention: Option<&ChatUserId>, link: &str) -> Result<()> {
        self.posts.lock().unwrap().push(RecordedPost {
            message: message.to_string(),
            mention: mention.map(|id| id.as_str().to_string()),
            link: link.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub to: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            subject: subject.to_string(),
            body: body.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }
}

/// Queue-scripted summarizer; responds `Ok("generated review")` once the
/// queue runs dry.
#[derive(Default)]
pub struct FakeSummarizer {
    responses: Mutex<VecDeque<Result<String, SummarizerError>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeSummarizer {
    pub fn respond(&self, response: Result<String, SummarizerError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, diff: &str) -> Result<String, SummarizerError> {
        self.requests.lock().unwrap().push(diff.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("generated review".to_string()))
    }
}

/// The full set of fake collaborators an engine test wires together.
pub struct Collaborators {
    pub source: Arc<FakeSource>,
    pub store: Arc<InMemoryStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub mailer: Arc<RecordingMailer>,
    pub summarizer: Arc<FakeSummarizer>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self {
            source: Arc::new(FakeSource::new()),
            store: Arc::new(InMemoryStore::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            mailer: Arc::new(RecordingMailer::default()),
            summarizer: Arc::new(FakeSummarizer::default()),
        }
    }

    pub fn table_rows(&self, rows: Vec<TrackedRow>) {
        self.store.set_rows(rows);
    }

    pub fn directory_pairs(&self, pairs: &[(&str, &str)]) {
        self.directory.set_pairs(pairs);
    }
}

/// An engine over the given collaborators with the default policy and a
/// single tracked repository (`octo/widgets`).
pub fn engine_with(c: &Collaborators) -> Engine {
    Engine {
        source: c.source.clone(),
        table: c.store.clone(),
        directory: c.directory.clone(),
        notifier: c.notifier.clone(),
        mailer: c.mailer.clone(),
        summarizer: c.summarizer.clone(),
        github_owner: "octo".to_string(),
        repositories: vec!["widgets".to_string()],
        operator_email: "ops@example.test".to_string(),
        policy: Policy::default(),
    }
}
