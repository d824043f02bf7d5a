//! Core data types: record values, records and errors.

pub mod error;
pub mod record;
pub mod value;

pub use error::{DatabaseError, Result};
pub use record::RowRecord;
pub use value::RowValue;
