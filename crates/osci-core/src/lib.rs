#![forbid(unsafe_code)]

pub mod algorithm;
pub mod codes;
pub mod config;
pub mod error;
pub mod ns;

pub use config::OsciConfig;
pub use error::{Error, Result};
