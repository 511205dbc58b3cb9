//! Read-only collaborator contracts for the monitor registry.

mod traits;

pub use traits::*;
