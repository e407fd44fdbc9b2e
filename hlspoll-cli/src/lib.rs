//! Library target for the `hlspoll` package.
//!
//! The binary (`src/main.rs`) is the deliverable; the helpers live here so
//! their doc-tests and unit tests run with `cargo test -p hlspoll`.

pub mod error;
pub mod input;
pub mod output;
pub mod progress;
pub mod utils;

#[doc(hidden)]
pub use hlspoll_engine;
