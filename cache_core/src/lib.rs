//! Direct-mapped cache simulation: the cache model, its configuration, the
//! access-trace format and the reports rendered after a run.

pub mod bits;
pub mod cache;
pub mod config;
pub mod report;
pub mod sim;
pub mod stat;
pub mod trace;
