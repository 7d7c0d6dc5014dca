//! Review intake: contract review mail into draft and live contract records.

pub mod config;
pub mod contract;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod review;
pub mod store;
