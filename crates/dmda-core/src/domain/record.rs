use serde::{Deserialize, Serialize};

/// One row of the curated salaries dataset.
///
/// Every column is nullable upstream, so every field is optional. Values are
/// stored exactly as the source produced them; nothing is validated or
/// defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub work_year: Option<i64>,
    pub experience_level: Option<String>,
    pub employment_type: Option<String>,
    pub job_title: Option<String>,
    pub salary: Option<i64>,
    pub salary_currency: Option<String>,
    pub salary_in_usd: Option<i64>,
    pub employee_residence: Option<String>,
    pub remote_ratio: Option<i64>,
    pub company_location: Option<String>,
    pub company_size: Option<String>,
    pub title_tokens: Option<Vec<String>>,
    pub title_role: Option<String>,
    pub title_domain: Option<String>,
    pub title_honorific: Option<String>,
}
