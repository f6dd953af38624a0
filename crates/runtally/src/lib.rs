//! Runtally: a concurrent test result recorder with an HTTP progress
//! concentrator.
//!
//! A [`ResultRecorder`](recorder::ResultRecorder) owns one run. Test code
//! records finished results into an append-only record stream, counts tests,
//! and keeps a JSON run summary current. A
//! [`ProgressConcentratorServer`](concentrator::ProgressConcentratorServer)
//! gathers progress postbacks from child processes into the same recorder
//! and optionally forwards the summary to an upstream collector.

#![forbid(unsafe_code)]
// Public API types have docs; the rest is still being filled in.
#![allow(missing_docs)]

pub mod catalog;
pub mod concentrator;
pub mod config;
pub mod error;
pub mod model;
pub mod progress;
pub mod recorder;

pub use crate::model::*;

pub use crate::concentrator::{ProgressConcentratorServer, RunningConcentrator};
pub use crate::config::{load_run_config, ForwardingInfo, RunConfig};
pub use crate::error::{RecorderError, RecorderResult};
pub use crate::progress::ProgressTable;
pub use crate::recorder::{ResultCounters, ResultRecorder, SummaryForwarder};
