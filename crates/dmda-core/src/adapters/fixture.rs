//! In-memory data source for offline runs and tests.
//!
//! Serves a fixed list of records in order. Failure injection (after K rows or
//! at query time) and a per-row delay make build outcomes and timing
//! deterministic.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::data_source::{DataSource, RowCursor, SourceError};
use crate::{CoreError, QuerySpec, Record};

/// Deterministic [`DataSource`] backed by a record list.
#[derive(Clone, Default)]
pub struct FixtureSource {
    records: Arc<Vec<Record>>,
    query_error: Option<SourceError>,
    fail_after: Option<(usize, SourceError)>,
    row_delay: Option<Duration>,
    queries: Arc<AtomicUsize>,
    rows_pulled: Arc<AtomicUsize>,
}

impl FixtureSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
            ..Self::default()
        }
    }

    /// Loads a JSON array of records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let body = std::fs::read_to_string(path)?;
        let records: Vec<Record> = serde_json::from_str(&body)?;
        Ok(Self::new(records))
    }

    /// A source whose query is rejected before any row is produced.
    pub fn failing_query(error: SourceError) -> Self {
        Self {
            query_error: Some(error),
            ..Self::default()
        }
    }

    /// Fails the cursor with `error` once `rows` records have been yielded.
    pub fn fail_after(mut self, rows: usize, error: SourceError) -> Self {
        self.fail_after = Some((rows, error));
        self
    }

    /// Sleeps before every pull, including the terminal one.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of times [`DataSource::query`] has been called.
    pub fn queries_issued(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Records handed out across all cursors.
    pub fn rows_pulled(&self) -> usize {
        self.rows_pulled.load(Ordering::SeqCst)
    }
}

impl DataSource for FixtureSource {
    fn id(&self) -> &'static str {
        "fixture"
    }

    fn query<'a>(
        &'a self,
        query: &'a QuerySpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RowCursor>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let _ = query;
            self.queries.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = &self.query_error {
                return Err(error.clone());
            }

            Ok(Box::new(FixtureCursor {
                records: Arc::clone(&self.records),
                position: 0,
                fail_after: self.fail_after.clone(),
                row_delay: self.row_delay,
                rows_pulled: Arc::clone(&self.rows_pulled),
                finished: false,
            }) as Box<dyn RowCursor>)
        })
    }
}

struct FixtureCursor {
    records: Arc<Vec<Record>>,
    position: usize,
    fail_after: Option<(usize, SourceError)>,
    row_delay: Option<Duration>,
    rows_pulled: Arc<AtomicUsize>,
    finished: bool,
}

impl RowCursor for FixtureCursor {
    fn next_row(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Record>, SourceError>> + Send + '_>> {
        Box::pin(async move {
            if self.finished {
                return Ok(None);
            }
            if let Some(delay) = self.row_delay {
                tokio::time::sleep(delay).await;
            }

            if let Some((rows, error)) = &self.fail_after {
                if self.position == *rows {
                    self.finished = true;
                    return Err(error.clone());
                }
            }

            match self.records.get(self.position) {
                Some(record) => {
                    self.position += 1;
                    self.rows_pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(record.clone()))
                }
                None => {
                    self.finished = true;
                    Ok(None)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::SourceErrorKind;

    fn record(year: i64) -> Record {
        Record {
            work_year: Some(year),
            ..Record::default()
        }
    }

    async fn drain(cursor: &mut Box<dyn RowCursor>) -> (Vec<Record>, Option<SourceError>) {
        let mut rows = Vec::new();
        loop {
            match cursor.next_row().await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => return (rows, None),
                Err(error) => return (rows, Some(error)),
            }
        }
    }

    #[tokio::test]
    async fn yields_records_in_order_then_end_of_sequence() {
        let source = FixtureSource::new(vec![record(2020), record(2021)]);
        let mut cursor = source
            .query(&QuerySpec::default())
            .await
            .expect("query should succeed");

        let (rows, error) = drain(&mut cursor).await;

        assert_eq!(rows, vec![record(2020), record(2021)]);
        assert!(error.is_none());
        assert_eq!(cursor.next_row().await, Ok(None));
        assert_eq!(source.queries_issued(), 1);
        assert_eq!(source.rows_pulled(), 2);
    }

    #[tokio::test]
    async fn fail_after_stops_at_requested_row() {
        let source = FixtureSource::new(vec![record(1), record(2), record(3)])
            .fail_after(2, SourceError::row_decode("bad row"));
        let mut cursor = source
            .query(&QuerySpec::default())
            .await
            .expect("query should succeed");

        let (rows, error) = drain(&mut cursor).await;

        assert_eq!(rows.len(), 2);
        assert_eq!(
            error.map(|e| e.kind()),
            Some(SourceErrorKind::RowDecode)
        );
    }

    #[tokio::test]
    async fn failing_query_never_yields_a_cursor() {
        let source = FixtureSource::failing_query(SourceError::connection("unreachable"));
        let result = source.query(&QuerySpec::default()).await;

        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(SourceErrorKind::Connection)
        );
    }

    #[test]
    fn loads_json_array_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"work_year": 2021, "company_size": "L"}}, {{"job_title": "Analyst"}}]"#
        )
        .expect("write fixture");

        let source = FixtureSource::from_json_file(file.path()).expect("fixture should load");

        assert_eq!(source.records().len(), 2);
        assert_eq!(source.records()[0].company_size.as_deref(), Some("L"));
        assert_eq!(source.records()[1].job_title.as_deref(), Some("Analyst"));
    }

    #[test]
    fn malformed_file_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{not json").expect("write fixture");

        let error = FixtureSource::from_json_file(file.path()).err();
        assert!(matches!(error, Some(CoreError::Serialization(_))));
    }
}
