//! Template source resolution (local paths and git checkouts).

pub mod git;
mod resolver;

pub use git::{GitCommand, GitError, GitOutput};
pub use resolver::GitSourceResolver;
