//! Data Models
//!
//! App-side data structures. Domain records live in `blogger_flow_core`.

pub mod conversation;
pub mod settings;

pub use conversation::*;
pub use settings::*;
