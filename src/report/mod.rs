//! Report generation and tabular exports.

pub mod export;
pub mod generator;

pub use export::export_tables;
pub use generator::{Reporter, ReporterConfig};
