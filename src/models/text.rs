use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::BillKey;

/// The latest text version recorded for a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillText {
    pub key: BillKey,
    /// Date the provider attached to this text version. Drives cache refresh.
    pub text_date: Option<NaiveDate>,
    pub text_url: Option<String>,
    pub xml_url: Option<String>,
    pub pdf_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}
