//! Test-session scaffolding for DC/OS framework suites.
//!
//! - [`registrar`]: register stub package repositories for one session and
//!   remove them again on every exit path
//! - [`registry`]: typed client seam over the package-repository registry
//! - [`dcos`]: `dcos` CLI implementation of the client traits
//! - [`agents`]: reclaim framework sandboxes on private agents
//! - [`session`]: run a test command as the guarded workload

pub mod agents;
pub mod cli;
pub mod config;
pub mod dcos;
pub mod error;
pub mod registrar;
pub mod registry;
pub mod session;
pub mod util;

pub use error::{Error, Result};
