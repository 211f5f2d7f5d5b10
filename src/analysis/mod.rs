//! Analysis modules.
//!
//! Per-question and grouped aggregation, headline metrics, and the
//! pipeline that runs them in order.

pub mod aggregator;
pub mod headline;
pub mod pipeline;

pub use aggregator::*;
pub use pipeline::*;
