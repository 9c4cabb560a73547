//! Instance replacement.

mod naming;
mod orchestrator;
mod state;


pub use naming::derive_replacement_name;
pub use orchestrator::{Replacement, ReplacementOrchestrator};
pub use state::ReplacementState;
