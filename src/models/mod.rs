//! Data Models
//!
//! Contains all data structures used throughout the copilot.

pub mod plan;
pub mod session;
pub mod settings;

pub use plan::*;
pub use session::*;
pub use settings::*;
