//! Shared types for shipbin.
//!
//! Everything here is pure data: no IO, no network. The core crate builds
//! the fetch/verify/install pipeline on top of these.

pub mod hash;
pub mod naming;
pub mod platform;
pub mod release;

// Re-exports
pub use hash::*;
pub use naming::*;
pub use platform::*;
pub use release::*;
