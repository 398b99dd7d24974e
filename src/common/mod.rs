// Common Module
//
// Types shared across the query pipeline.

pub mod types;

pub use self::types::{ElementType, Value};
