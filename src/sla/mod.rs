//! Time-based SLA sweeps over the entity graph

pub mod monitor;

pub use monitor::{SlaConfig, SlaMonitor};
