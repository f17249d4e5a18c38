//! Seams between the interpreter and the outside world.
//!
//! Everything here is a driven port: [`ApplyService`](super::ApplyService)
//! calls it and `quilt-adapters` implements it. The filesystem serves both
//! the target tree and the resolved source root; `run` actions go through
//! the command runner so dry runs can record instead of execute.

pub mod output;

pub use output::{CommandRunner, Filesystem, FragmentLoader, SourceResolver};

#[cfg(test)]
pub use output::{MockCommandRunner, MockSourceResolver};
