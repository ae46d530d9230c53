//! Data source trait and row cursor contract.
//!
//! A [`DataSource`] turns a [`QuerySpec`] into a [`RowCursor`]: a lazy,
//! finite, non-restartable producer of [`Record`]s. Each pull yields a record,
//! signals end-of-sequence with `Ok(None)`, or fails with a [`SourceError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use dmda_core::{DataSource, QuerySpec, SourceError};
//!
//! async fn count_rows(source: &dyn DataSource) -> Result<usize, SourceError> {
//!     let query = QuerySpec::default();
//!     let mut cursor = source.query(&query).await?;
//!     let mut rows = 0;
//!     while cursor.next_row().await?.is_some() {
//!         rows += 1;
//!     }
//!     Ok(rows)
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{QuerySpec, Record};

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The source could not be reached.
    Connection,
    /// The source rejected or failed the query.
    QueryExecution,
    /// A row could not be decoded into a [`Record`].
    RowDecode,
    /// The fetch stopped because cancellation was requested.
    Cancelled,
}

/// Structured error surfaced by a source and recorded as a failed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn query_execution(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::QueryExecution,
            message: message.into(),
        }
    }

    pub fn row_decode(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RowDecode,
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Cancelled,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Connection => "source.connection",
            SourceErrorKind::QueryExecution => "source.query_execution",
            SourceErrorKind::RowDecode => "source.row_decode",
            SourceErrorKind::Cancelled => "source.cancelled",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Pull-based iteration over the rows of one query.
///
/// Cursors are consumed once. After `Ok(None)` or an error the cursor must not
/// be polled again.
pub trait RowCursor: Send {
    /// Pulls the next record, `Ok(None)` at end-of-sequence.
    fn next_row(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Record>, SourceError>> + Send + '_>>;
}

/// Source adapter contract.
///
/// Implementations must be `Send + Sync`; the build coordinator shares one
/// adapter with its background task.
pub trait DataSource: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &'static str;

    /// Issues `query` and returns a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source is unreachable
    /// ([`SourceErrorKind::Connection`]) or rejects the query
    /// ([`SourceErrorKind::QueryExecution`]).
    fn query<'a>(
        &'a self,
        query: &'a QuerySpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RowCursor>, SourceError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_code() {
        let error = SourceError::row_decode("row 3: salary is not an integer");
        assert_eq!(
            error.to_string(),
            "row 3: salary is not an integer (source.row_decode)"
        );
    }

    #[test]
    fn constructors_set_matching_kind() {
        assert_eq!(
            SourceError::connection("x").kind(),
            SourceErrorKind::Connection
        );
        assert_eq!(
            SourceError::query_execution("x").kind(),
            SourceErrorKind::QueryExecution
        );
        assert_eq!(
            SourceError::cancelled("x").code(),
            "source.cancelled"
        );
    }
}
