use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::BillKey;

/// A generated summary of one bill text version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub key: BillKey,
    /// Date of the text version that was summarized.
    pub content_date: Option<NaiveDate>,
    pub content: String,
    pub model_version: String,
    pub generated_at: DateTime<Utc>,
}
