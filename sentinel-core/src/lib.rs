pub mod dify;
pub mod review;

pub use dify::{DifyClient, Summarizer, SummarizerError};
pub use review::join_patches;
