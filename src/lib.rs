mod config;
mod core;
mod errors;
pub mod metrics;
mod processor;
pub(crate) mod utils;

pub use crate::core::*;
pub use config::*;
pub use errors::*;
pub use processor::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
