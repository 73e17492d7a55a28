//! hostwatch -- Event correlation and rule-matching engine for multi-host
//! log monitoring.
//!
//! This crate is the core library behind a monitoring dashboard: it pairs
//! asynchronous login/logout events into session lifecycles, evaluates raw
//! log text against a user-editable rule catalog via substring matching,
//! downsamples heterogeneous telemetry into fixed time buckets for charting,
//! and composes all three behind a paginated query facade. Persistence,
//! rendering, and notification delivery are external collaborators; every
//! operation here is a synchronous transformation over batches already
//! materialized in memory.

pub mod alerts;
pub mod authlog;
pub mod catalog;
pub mod matcher;
pub mod model;
pub mod query;
pub mod series;
pub mod sessions;
pub mod storage;
