pub mod convert;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logging;
pub mod model;
pub mod sync;
pub mod tables;
pub mod volume;

pub use error::{Result, ToolError};
