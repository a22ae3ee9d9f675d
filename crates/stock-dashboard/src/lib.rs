pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod identity;
pub mod logging;
pub mod monitor;
pub mod row_sanitize;
pub mod status;

pub use error::{Error, Result};
