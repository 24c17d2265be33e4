//! Test fixtures and helpers for Weft development.
//!
//! Provides a [`Fixtures`] bundle of ready-built schemas covering every
//! slot kind, default style and initializer style, plus
//! [`init_tracing`] for seeing engine logs in test output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{book_description, is_author, set_book_description, Bar, Fixtures};
pub use futures::executor::block_on;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
