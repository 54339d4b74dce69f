use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::BillKey;

/// One event in a bill's legislative history. Append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillAction {
    pub key: BillKey,
    pub action_code: Option<String>,
    pub action_date: Option<NaiveDate>,
    pub action_text: String,
    pub action_type: Option<String>,
}
