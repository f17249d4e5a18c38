//! Infrastructure adapters for Quilt.
//!
//! This crate implements the ports defined in `quilt-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod command_runner;
pub mod filesystem;
pub mod fragment_loader;
pub mod interrupt;
pub mod source;

// Re-export commonly used adapters
pub use command_runner::{DryRunCommandRunner, PlannedCommand, ProcessCommandRunner};
pub use filesystem::{ChangeKind, LocalFilesystem, MemoryFilesystem, OverlayFilesystem};
pub use fragment_loader::TomlFragmentLoader;
pub use interrupt::Interrupt;
pub use source::GitSourceResolver;
