//! Utility functions for display formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_bathrooms, format_date, format_optional, format_price, truncate_string};
