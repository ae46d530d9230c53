//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Record`] | One row of the curated salaries table |
//! | [`Column`] | Source column names |
//! | [`QuerySpec`] | Table and projection read by a build |

mod column;
mod query;
mod record;

pub use column::Column;
pub use query::{QuerySpec, DEFAULT_TABLE};
pub use record::Record;
