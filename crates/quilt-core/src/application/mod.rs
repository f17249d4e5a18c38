//! Application layer for Quilt.
//!
//! This layer contains:
//! - **Services**: the fragment interpreter (`ApplyService`) and its run report
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer; text matching, the
//! dependency ledger and the deferred queue live in `crate::domain`.

pub mod error;
pub mod ports;
pub mod services;

pub use services::{ApplyService, MutationOutcome, RunFailure, RunReport, SkipReason};

pub use ports::{CommandRunner, Filesystem, FragmentLoader, SourceResolver};

pub use error::ApplicationError;
