//! Definiciones de eventos y bus in-process.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{EventKind, OrchestratorEvent};
