//! Core domain layer for Quilt.
//!
//! Pure text logic with no I/O: template references, anchor matching,
//! fragments and their actions, the dependency ledger, the deferred action
//! queue and content rendering. Filesystem, git and process concerns are
//! reached through ports defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, network, or external calls
//! - **Fresh anchors**: Match positions are recomputed for every edit

pub mod anchor;
pub mod common;
pub mod context;
pub mod deferred;
pub mod dependency;
pub mod error;
pub mod fragment;
pub mod reference;

pub use anchor::{Anchor, Position, ScopeKind};
pub use common::RelativePath;
pub use context::{DEFAULT_MANIFEST, RenderContext, RunConfig, parse_option};
pub use deferred::{DeferredAction, DeferredQueue};
pub use dependency::{DependencyDeclaration, DependencyLedger, Group, GroupSet};
pub use error::{DomainError, ErrorCategory};
pub use fragment::{Action, CreateMode, Fragment, FragmentMetadata, Package};
pub use reference::{DEFAULT_ENTRY, ReferenceKind, ResolvedSource, TemplateReference};
