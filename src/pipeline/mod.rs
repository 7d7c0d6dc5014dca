//! Review ingestion pipeline.
//!
//! `ReviewPoller` calls `ReviewPipeline::run_tick()` on a fixed interval.
//! Each tick lists the monitored folder and gives every message exactly one
//! `Disposition`: routed to a folder, or left in place for the next tick.

pub mod poller;
pub mod processor;
pub mod types;

pub use poller::{PollerHandle, ReviewPoller};
pub use processor::ReviewPipeline;
pub use types::{Disposition, RetainReason, TickReport};
