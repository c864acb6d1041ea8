//! zeropack library exports.
//!
//! Validates that a source directory holds a complete installation, including
//! every library its executables import, and stages a minimal copy of it.

pub mod config;
pub mod deploy;
pub mod error;
pub mod imports;
pub mod profile;
pub mod scope;
pub mod timing;
pub mod whitelist;

pub use deploy::{Decision, DeployOptions, DeploySummary, Deployer, DeploymentAction};
pub use error::{Error, Result};
pub use imports::ImportExtractor;
pub use profile::Profile;
pub use scope::PathScope;
pub use whitelist::{MatchStrategy, Validation, WhitelistValidator};
