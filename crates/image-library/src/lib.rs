mod database;
mod processor;

pub use database::*;
pub use processor::*;
