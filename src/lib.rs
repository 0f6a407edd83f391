#![doc(test(attr(deny(warnings))))]

//! Tracker Core keeps a personal ledger of income and expense transactions and
//! materializes recurring rules into concrete, deduplicated transactions.

pub mod cli;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod time;
pub mod utils;

pub use errors::{Result, TrackerError};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!(
            build = %utils::build_info::current().summary(),
            "Tracker Core tracing initialized."
        );
    });
}
