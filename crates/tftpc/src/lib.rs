//! tftpc support library
//!
//! The command-line client's transfer driver lives here so integration
//! tests can exercise it directly; the `tftpc` binary is a thin argument
//! parser on top.

pub mod driver;

pub use driver::{DriverConfig, fetch_file, store_file};
