use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Source column of the curated salaries table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    WorkYear,
    ExperienceLevel,
    EmploymentType,
    JobTitle,
    Salary,
    SalaryCurrency,
    SalaryInUsd,
    EmployeeResidence,
    RemoteRatio,
    CompanyLocation,
    CompanySize,
    TitleTokens,
    TitleRole,
    TitleDomain,
    TitleHonorific,
}

impl Column {
    /// Every column, in table order.
    pub const ALL: [Self; 15] = [
        Self::WorkYear,
        Self::ExperienceLevel,
        Self::EmploymentType,
        Self::JobTitle,
        Self::Salary,
        Self::SalaryCurrency,
        Self::SalaryInUsd,
        Self::EmployeeResidence,
        Self::RemoteRatio,
        Self::CompanyLocation,
        Self::CompanySize,
        Self::TitleTokens,
        Self::TitleRole,
        Self::TitleDomain,
        Self::TitleHonorific,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkYear => "work_year",
            Self::ExperienceLevel => "experience_level",
            Self::EmploymentType => "employment_type",
            Self::JobTitle => "job_title",
            Self::Salary => "salary",
            Self::SalaryCurrency => "salary_currency",
            Self::SalaryInUsd => "salary_in_usd",
            Self::EmployeeResidence => "employee_residence",
            Self::RemoteRatio => "remote_ratio",
            Self::CompanyLocation => "company_location",
            Self::CompanySize => "company_size",
            Self::TitleTokens => "title_tokens",
            Self::TitleRole => "title_role",
            Self::TitleDomain => "title_domain",
            Self::TitleHonorific => "title_honorific",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let needle = value.trim();
        Self::ALL
            .into_iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::UnknownColumn {
                value: value.to_owned(),
            })
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
