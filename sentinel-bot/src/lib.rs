pub mod config;
pub mod directory;
pub mod engine;
pub mod github;
pub mod locator;
pub mod mail;
pub mod notify;
pub mod store;

#[cfg(test)]
pub mod test_support;

pub use config::Config;
pub use engine::Engine;
pub use locator::PullRequestLocator;
