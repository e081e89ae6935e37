// src/monitor/mod.rs
mod scheduler;
mod state;

pub use scheduler::{Monitor, Notification, RoundReport, ShutdownHandle};
pub use state::{Snapshot, StateTracker, TargetStatus};
