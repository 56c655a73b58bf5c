//! Channel metrics
//!
//! Per-manager counters for connection churn and message flow.

mod counters;

pub use counters::ChannelStats;
