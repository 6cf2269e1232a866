//! Runtime state and history logs on disk.

pub mod history_log;
pub mod state_store;

pub use history_log::HistoryLog;
pub use state_store::{PersistedState, StateStore};
