pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod index;
pub mod io;
pub mod merge;
pub mod model;
pub mod sync;

pub use error::{Result, ToolError};
