mod error;
pub mod measure;
mod rotation;
mod window;

pub use crate::error::{ArgumentError, ConfigError, Result, WindowError};
pub use crate::window::{Tally, Window, WindowOptions};
