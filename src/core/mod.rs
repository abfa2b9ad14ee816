pub mod errors;
pub mod geometry;
pub mod retry;
pub mod state_machine;
pub mod types;
