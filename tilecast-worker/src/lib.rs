//! # Tilecast Worker
//!
//! The pull side of Tilecast. A worker long-polls the dispatch server for
//! tile jobs, runs each tile through the encoder and uploads the result.
//!
//! - [`client`]: [`HttpJobClient`], the reqwest-based poll and result relay
//! - [`poll_loop`]: the cancellable [`PollLoop`] state machine
//! - [`worker`]: the [`Worker`] job handler (encode, then relay)

#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod poll_loop;
pub mod ports;
pub mod worker;

pub use client::HttpJobClient;
pub use error::WorkerError;
pub use poll_loop::{PollLoop, PollState};
pub use ports::{JobHandler, JobSource, PollOutcome, ResultSink};
pub use worker::Worker;
