//! Install operations

pub mod error;
pub mod install;

pub use error::InstallError;
pub use install::{InstallOutcome, InstallPlan};
