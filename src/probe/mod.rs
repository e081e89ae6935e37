// src/probe/mod.rs
mod prober;
mod target;

pub use prober::{Prober, TcpProber};
pub use target::{ProbeResult, Target};
