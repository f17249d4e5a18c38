//! Template application engine.
//!
//! A run fetches a template source, interprets its entry fragment against an
//! existing application tree and finishes by draining the actions the
//! fragment deferred. The crate is split in two layers:
//!
//! - [`domain`]: references, anchors, fragments, the dependency ledger and
//!   the deferred queue. Pure text logic, no I/O.
//! - [`application`]: [`application::ApplyService`] and the ports it drives
//!   (filesystem, source resolver, fragment loader, command runner).
//!   Implementations live in `quilt-adapters`.
//!
//! ```rust,ignore
//! use quilt_core::prelude::*;
//!
//! let service = ApplyService::new(resolver, loader, filesystem, runner);
//! let reference = TemplateReference::parse("https://github.com/acme/templates.git#v2")?;
//! let report = service.apply(&reference, "./my-app", &RunConfig::new("my-app"))?;
//! println!("{} actions applied", report.applied);
//! ```

pub mod application;
pub mod domain;
pub mod error;

pub mod prelude {
    pub use crate::application::{
        ApplyService, RunFailure, RunReport,
        ports::{CommandRunner, Filesystem, FragmentLoader, SourceResolver},
    };
    pub use crate::domain::{
        Action, Anchor, DependencyLedger, Fragment, Group, RenderContext, ResolvedSource,
        RunConfig, TemplateReference,
    };
    pub use crate::error::{QuiltError, QuiltResult};
}
