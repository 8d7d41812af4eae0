//! Latchkey weaver
//!
//! A one-shot, build-time transform that rewrites empty accessor stubs in
//! a compiled module into direct loads, stores, calls, and allocations
//! against non-public members of arbitrary types, and records the
//! module-level access waivers that make those accesses legal at load
//! time. Runs once per module; failures of individual stubs are reported
//! and skipped, leaving those stubs exactly as scanned.

pub mod diag;
pub mod error;
pub mod markers;
pub mod type_name;

mod binder;
mod emit;
mod registrar;
mod resolve;
mod scan;
mod weaver;

pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{WeaveError, WeaveResult};
pub use markers::{AccessorKind, StubDeclaration};
pub use resolve::ModuleSet;
pub use weaver::{WeaveReport, Weaver};
