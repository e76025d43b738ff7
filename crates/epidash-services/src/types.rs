//! Wire and domain types for the prediction backend.

use chrono::NaiveDate;
use epidash_core::ValidationError;
use serde::{Deserialize, Serialize};

/// One day of a case-count series.
///
/// Dates travel as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Dataset (disease) the backend can serve and forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dataset {
    #[default]
    #[serde(rename = "covid19")]
    Covid19,
    /// Viral pneumonia. The spelling is the backend's identifier.
    #[serde(rename = "pneumania")]
    Pneumania,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Covid19, Dataset::Pneumania];

    /// `ds_name` query value
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Covid19 => "covid19",
            Dataset::Pneumania => "pneumania",
        }
    }

    /// Name of the model that forecasts this dataset
    pub fn model_name(self) -> String {
        format!("{}_model", self.as_str())
    }

    /// Human-readable label for selectors
    pub fn label(self) -> &'static str {
        match self {
            Dataset::Covid19 => "Covid-19",
            Dataset::Pneumania => "Viral pneumonia",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dataset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ValidationError::new("dataset", format!("unknown dataset '{}'", s.trim()))
            })
    }
}

/// Inclusive date range with `begin <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    begin: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if begin > end {
            return Err(ValidationError::new(
                "date_end",
                "must not be earlier than the start date",
            ));
        }
        Ok(Self { begin, end })
    }

    /// Parse two `YYYY-MM-DD` form inputs.
    pub fn parse(begin: &str, end: &str) -> Result<Self, ValidationError> {
        let begin = parse_date("date_begin", begin)?;
        let end = parse_date("date_end", end)?;
        Self::new(begin, end)
    }

    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.begin).num_days() + 1
    }

    /// `date_begin` / `date_end` query pairs
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("date_begin", self.begin.to_string()),
            ("date_end", self.end.to_string()),
        ]
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::new(field, "must be a date in YYYY-MM-DD format"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest<'a> {
    #[serde(rename = "X")]
    pub x: &'a [f64],
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    pub forecast: Vec<f64>,
}
