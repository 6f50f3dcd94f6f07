use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title used when a source file carries no survey identification.
pub const UNKNOWN_SURVEY: &str = "Unknown Survey";

/// Sentinel the dashboard sends when no survey-version constraint is set.
pub const ALL_VERSIONS: &str = "all";

/// The `results` object of a stored response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub score: Option<f64>,
    pub percentage: Option<f64>,
    #[serde(default)]
    pub answers: BTreeMap<String, Value>,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

/// One respondent's completed survey, in canonical form.
///
/// Every record that reaches the data service has a non-empty id, a
/// timestamp, a survey title and a present (possibly empty) payload.
/// `synthetic_timestamp` marks records whose source file carried no
/// parseable timestamp and whose value was filled with record-read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub synthetic_timestamp: bool,
    pub survey_title: String,
    pub results: ResponsePayload,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One recorded delivery of results to a recipient address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub id: String,
    pub recipient_email: String,
    pub survey_title: String,
    pub results: ResponsePayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub synthetic_timestamp: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
}

/// Active user-chosen constraints. An absent field means "no constraint
/// on that dimension"; `survey_version` is also inactive when it holds
/// the `"all"` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub survey_version: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub score_min: Option<f64>,
    pub score_max: Option<f64>,
    #[serde(default)]
    pub completed_only: bool,
}

/// Outcome of a completed `load_data` pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub responses: usize,
    pub emails: usize,
    pub rejected_emails: usize,
}
