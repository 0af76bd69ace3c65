pub mod control;
pub mod demo;
pub mod error;
pub mod models;
pub mod utils;

pub use error::{DimensionError, Error, LinAlgError};
