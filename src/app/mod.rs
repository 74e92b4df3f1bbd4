//! Application state and background tasks.

pub mod broadcast;
pub mod runtime;
pub mod state;

pub use state::{AppState, Liveness};
