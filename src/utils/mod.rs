//! Utils Module
pub mod telemetry;
pub mod time;

pub use telemetry::init_tracing;
pub use time::next_hour_slot;
