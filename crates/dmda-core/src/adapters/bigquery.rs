//! BigQuery REST adapter.
//!
//! Runs the query through `jobs.query` and pages through the result with
//! `jobs.getQueryResults`. Pages are fetched lazily: the cursor only asks for
//! the next page once the buffered rows are exhausted.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::data_source::{DataSource, RowCursor, SourceError};
use crate::http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse,
};
use crate::observability::LOG_TARGET;
use crate::{QuerySpec, Record, ValidationError};

/// Public BigQuery v2 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Connection and paging settings for [`BigQueryAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryConfig {
    pub project_id: String,
    pub base_url: String,
    /// Rows requested per page (`maxResults`).
    pub page_size: u32,
    /// Transport timeout for each HTTP call.
    pub request_timeout_ms: u64,
    /// Server-side wait for job completion per call (`timeoutMs`).
    pub job_timeout_ms: u64,
    /// How many consecutive "job not complete" responses are tolerated.
    pub max_incomplete_polls: u32,
}

impl BigQueryConfig {
    pub fn new(project_id: impl Into<String>) -> Result<Self, ValidationError> {
        let config = Self {
            project_id: project_id.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            page_size: 10_000,
            request_timeout_ms: 30_000,
            job_timeout_ms: 10_000,
            max_incomplete_polls: 30,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.trim().is_empty() {
            return Err(ValidationError::EmptyProjectId);
        }
        if self.page_size == 0 {
            return Err(ValidationError::ZeroPageSize);
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::ZeroRequestTimeout);
        }
        Ok(())
    }

    fn queries_url(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}/queries",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(project_id)
        )
    }
}

/// Reads query results from the BigQuery REST API.
#[derive(Clone)]
pub struct BigQueryAdapter {
    config: Arc<BigQueryConfig>,
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
}

impl BigQueryAdapter {
    pub fn new(
        config: BigQueryConfig,
        http_client: Arc<dyn HttpClient>,
        auth: HttpAuth,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            http_client,
            auth,
        })
    }
}

impl DataSource for BigQueryAdapter {
    fn id(&self) -> &'static str {
        "bigquery"
    }

    fn query<'a>(
        &'a self,
        query: &'a QuerySpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RowCursor>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "query": query.to_sql(),
                "useLegacySql": false,
                "maxResults": self.config.page_size,
                "timeoutMs": self.config.job_timeout_ms,
            });
            let request =
                HttpRequest::post_json(self.config.queries_url(&self.config.project_id), &body)
                    .with_auth(&self.auth)
                    .with_timeout_ms(self.config.request_timeout_ms);

            let page = execute_page(self.http_client.as_ref(), request).await?;
            tracing::debug!(
                target: LOG_TARGET,
                table = query.table(),
                job_complete = page.job_complete,
                rows = page.rows.len(),
                "bigquery query accepted"
            );

            let mut cursor = BigQueryCursor {
                config: Arc::clone(&self.config),
                http_client: Arc::clone(&self.http_client),
                auth: self.auth.clone(),
                job: None,
                schema: None,
                buffer: VecDeque::new(),
                page_token: None,
                complete: false,
                incomplete_polls: 0,
                next_index: 0,
                exhausted: false,
            };
            cursor.absorb(page)?;
            Ok(Box::new(cursor) as Box<dyn RowCursor>)
        })
    }
}

struct BigQueryCursor {
    config: Arc<BigQueryConfig>,
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    job: Option<JobReference>,
    schema: Option<Arc<[FieldSchema]>>,
    buffer: VecDeque<TableRow>,
    page_token: Option<String>,
    complete: bool,
    incomplete_polls: u32,
    next_index: u64,
    exhausted: bool,
}

impl BigQueryCursor {
    fn absorb(&mut self, page: QueryPage) -> Result<(), SourceError> {
        if let Some(job) = page.job_reference {
            self.job = Some(job);
        }
        self.complete = page.job_complete;
        if !page.job_complete {
            self.incomplete_polls += 1;
            if self.incomplete_polls > self.config.max_incomplete_polls {
                return Err(SourceError::query_execution(format!(
                    "bigquery job did not complete after {} polls",
                    self.incomplete_polls
                )));
            }
            return Ok(());
        }

        if let Some(schema) = page.schema {
            self.schema = Some(schema.fields.into());
        }
        self.page_token = page.page_token.filter(|token| !token.is_empty());
        self.buffer.extend(page.rows);
        Ok(())
    }

    fn has_more_pages(&self) -> bool {
        !self.complete || self.page_token.is_some()
    }

    async fn fetch_next_page(&mut self) -> Result<(), SourceError> {
        let job = self.job.as_ref().ok_or_else(|| {
            SourceError::query_execution("bigquery response is missing a job reference")
        })?;

        let url = format!(
            "{}/{}",
            self.config.queries_url(&job.project_id),
            urlencoding::encode(&job.job_id)
        );
        let mut request = HttpRequest::get(url)
            .with_query("maxResults", &self.config.page_size.to_string())
            .with_query("timeoutMs", &self.config.job_timeout_ms.to_string());
        if let Some(token) = &self.page_token {
            request = request.with_query("pageToken", token);
        }
        if let Some(location) = &job.location {
            request = request.with_query("location", location);
        }
        let request = request
            .with_auth(&self.auth)
            .with_timeout_ms(self.config.request_timeout_ms);

        let page = execute_page(self.http_client.as_ref(), request).await?;
        tracing::debug!(
            target: LOG_TARGET,
            job_complete = page.job_complete,
            rows = page.rows.len(),
            "bigquery page fetched"
        );
        self.absorb(page)
    }

    fn decode_next(&mut self, row: TableRow) -> Result<Record, SourceError> {
        let index = self.next_index;
        self.next_index += 1;
        let schema = self.schema.as_deref().ok_or_else(|| {
            SourceError::row_decode(format!("row {index}: result schema is missing"))
        })?;
        decode_row(schema, row, index)
    }
}

impl RowCursor for BigQueryCursor {
    fn next_row(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Record>, SourceError>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if let Some(row) = self.buffer.pop_front() {
                    return self.decode_next(row).map(Some);
                }
                if self.exhausted || !self.has_more_pages() {
                    self.exhausted = true;
                    return Ok(None);
                }
                self.fetch_next_page().await?;
            }
        })
    }
}

async fn execute_page(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<QueryPage, SourceError> {
    let response = client.execute(request).await.map_err(transport_error)?;
    if !response.is_success() {
        return Err(status_error(&response));
    }
    serde_json::from_str::<QueryPage>(&response.body).map_err(|e| {
        SourceError::query_execution(format!("malformed bigquery response: {e}"))
    })
}

fn transport_error(error: HttpError) -> SourceError {
    let stage = match error.kind() {
        HttpErrorKind::Timeout => "request timed out",
        HttpErrorKind::Connect => "could not connect",
        HttpErrorKind::Body => "response body could not be read",
        HttpErrorKind::Other => "transport error",
    };
    SourceError::connection(format!("bigquery {stage}: {}", error.message()))
}

fn status_error(response: &HttpResponse) -> SourceError {
    let detail = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty());

    match detail {
        Some(message) => SourceError::query_execution(format!(
            "bigquery returned status {}: {message}",
            response.status
        )),
        None => SourceError::query_execution(format!(
            "bigquery returned status {}",
            response.status
        )),
    }
}

/// Converts one `{"f": [{"v": ...}]}` row into a [`Record`] using the result
/// schema. Columns without a matching record field are ignored.
pub(crate) fn decode_row(
    schema: &[FieldSchema],
    row: TableRow,
    index: u64,
) -> Result<Record, SourceError> {
    if row.f.len() != schema.len() {
        return Err(SourceError::row_decode(format!(
            "row {index}: expected {} cells, found {}",
            schema.len(),
            row.f.len()
        )));
    }

    let mut object = Map::with_capacity(schema.len());
    for (field, cell) in schema.iter().zip(row.f) {
        let value = decode_cell(field, cell.v)
            .map_err(|reason| SourceError::row_decode(format!("row {index}: {reason}")))?;
        object.insert(field.name.clone(), value);
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|e| SourceError::row_decode(format!("row {index}: {e}")))
}

fn decode_cell(field: &FieldSchema, raw: Value) -> Result<Value, String> {
    if field.is_repeated() {
        return match raw {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    let inner = match item {
                        Value::Object(mut wrapper) => wrapper.remove("v").unwrap_or(Value::Null),
                        other => other,
                    };
                    decode_scalar(field, inner)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(format!(
                "column '{}' is REPEATED but cell is {other}",
                field.name
            )),
        };
    }
    decode_scalar(field, raw)
}

fn decode_scalar(field: &FieldSchema, raw: Value) -> Result<Value, String> {
    let text = match raw {
        Value::Null => return Ok(Value::Null),
        Value::String(text) => text,
        other => return Ok(other),
    };

    match field.field_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(|value| Value::Number(value.into()))
            .map_err(|_| format!("column '{}' is not an integer: '{text}'", field.name)),
        "FLOAT" | "FLOAT64" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("column '{}' is not a finite float: '{text}'", field.name)),
        "BOOLEAN" | "BOOL" => match text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("column '{}' is not a boolean: '{text}'", field.name)),
        },
        _ => Ok(Value::String(text)),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

impl FieldSchema {
    fn is_repeated(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("REPEATED"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}
