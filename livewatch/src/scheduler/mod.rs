//! Background loops for livewatch.
//!
//! This module provides:
//! - [`Reconciler`]: periodic room list polling and listener convergence
//! - [`StatusReporter`]: periodic listener status logging

pub mod reconciler;
pub mod status;

pub use reconciler::{Reconciler, ReconcilerConfig, TickSummary};
pub use status::StatusReporter;
