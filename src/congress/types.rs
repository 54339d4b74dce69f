use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{parse_date, parse_timestamp, BillAction, BillCandidate, BillKey};

/// One page of the bill list endpoint.
#[derive(Debug, Deserialize)]
pub struct BillsPage {
    #[serde(default)]
    pub bills: Vec<WireBill>,
}

/// A bill as the provider serializes it. Every field is optional so one
/// malformed record never sinks a whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBill {
    pub congress: Option<i64>,
    #[serde(rename = "type")]
    pub bill_type: Option<String>,
    pub number: Option<BillNumber>,
    pub title: Option<String>,
    pub origin_chamber: Option<String>,
    pub origin_chamber_code: Option<String>,
    pub latest_action: Option<WireLatestAction>,
    pub update_date: Option<String>,
    pub url: Option<String>,
}

/// The provider serializes bill numbers as strings in list payloads and as
/// integers in a few detail payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BillNumber {
    Int(i64),
    Text(String),
}

impl BillNumber {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BillNumber::Int(n) => Some(*n),
            BillNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLatestAction {
    pub action_date: Option<String>,
    pub text: Option<String>,
}

impl WireBill {
    pub fn key(&self) -> Option<BillKey> {
        let congress = self.congress?;
        let bill_type = self.bill_type.as_deref()?.parse().ok()?;
        let number = self.number.as_ref()?.as_i64()?;
        Some(BillKey::new(congress, bill_type, number))
    }

    /// Normalize for reconciliation. None means the natural key could not
    /// be parsed and the record must be ignored.
    pub fn candidate(&self) -> Option<BillCandidate> {
        let key = self.key()?;
        Some(BillCandidate {
            key,
            title: self.title.clone().unwrap_or_default(),
            origin_chamber: self.origin_chamber.clone(),
            origin_chamber_code: self.origin_chamber_code.clone(),
            latest_action_date: self
                .latest_action
                .as_ref()
                .and_then(|a| a.action_date.as_deref())
                .and_then(parse_date),
            latest_action_text: self.latest_action.as_ref().and_then(|a| a.text.clone()),
            update_date: self.update_date.as_deref().and_then(parse_timestamp),
            source_url: self.url.clone(),
        })
    }

    /// Oldest-usable ordering signal for the stop predicate.
    pub fn update_stamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.update_date.as_deref().and_then(parse_timestamp)
    }
}

/// The action history endpoint payload.
#[derive(Debug, Deserialize)]
pub struct ActionsPage {
    #[serde(default)]
    pub actions: Vec<WireAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAction {
    pub action_code: Option<String>,
    pub action_date: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub action_type: Option<String>,
}

impl WireAction {
    pub fn into_action(self, key: BillKey) -> BillAction {
        BillAction {
            key,
            action_code: self.action_code,
            action_date: self.action_date.as_deref().and_then(parse_date),
            action_text: self.text.unwrap_or_default(),
            action_type: self.action_type,
        }
    }
}

/// The text versions endpoint payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextVersionsResponse {
    #[serde(default)]
    pub text_versions: Vec<WireTextVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTextVersion {
    pub date: Option<String>,
    #[serde(default)]
    pub formats: Vec<WireTextFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTextFormat {
    #[serde(rename = "type")]
    pub format_type: Option<String>,
    pub url: Option<String>,
}

impl WireTextVersion {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }

    pub fn url_for(&self, format_type: &str) -> Option<String> {
        self.formats
            .iter()
            .find(|f| f.format_type.as_deref() == Some(format_type))
            .and_then(|f| f.url.clone())
    }
}

impl TextVersionsResponse {
    /// The most recently dated version. Undated versions never qualify.
    pub fn latest(&self) -> Option<&WireTextVersion> {
        self.text_versions
            .iter()
            .filter(|v| v.parsed_date().is_some())
            .max_by_key(|v| v.parsed_date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillType;

    #[test]
    fn wire_bill_parses_string_and_integer_numbers() {
        let page: BillsPage = serde_json::from_str(
            r#"{"bills": [
                {"congress": 118, "type": "HR", "number": "7032", "title": "A bill",
                 "latestAction": {"actionDate": "2024-04-29", "text": "Referred."},
                 "updateDate": "2024-04-29T14:30:22Z"},
                {"congress": 118, "type": "s", "number": 500, "title": "Another"}
            ]}"#,
        )
        .expect("parse page");

        let first = page.bills[0].candidate().expect("candidate");
        assert_eq!(first.key, BillKey::new(118, BillType::Hr, 7032));
        assert_eq!(
            first.latest_action_date,
            NaiveDate::from_ymd_opt(2024, 4, 29)
        );
        assert_eq!(first.update_date, parse_timestamp("2024-04-29T14:30:22Z"));

        let second = page.bills[1].candidate().expect("candidate");
        assert_eq!(second.key, BillKey::new(118, BillType::S, 500));
        assert!(second.update_date.is_none());
    }

    #[test]
    fn malformed_keys_yield_no_candidate() {
        let no_type: WireBill = serde_json::from_str(
            r#"{"congress": 118, "number": "7032", "title": "No type"}"#,
        )
        .expect("parse");
        assert!(no_type.candidate().is_none());

        let bad_type: WireBill = serde_json::from_str(
            r#"{"congress": 118, "type": "treaty", "number": "1", "title": "Bad type"}"#,
        )
        .expect("parse");
        assert!(bad_type.candidate().is_none());
    }

    #[test]
    fn latest_text_version_wins_by_date() {
        let response: TextVersionsResponse = serde_json::from_str(
            r#"{"textVersions": [
                {"date": "2024-04-29T04:00:00Z", "formats": [
                    {"type": "Formatted Text", "url": "https://example.gov/ih.htm"}]},
                {"date": "2024-09-10T04:00:00Z", "formats": [
                    {"type": "Formatted Text", "url": "https://example.gov/eh.htm"},
                    {"type": "PDF", "url": "https://example.gov/eh.pdf"}]},
                {"date": null, "formats": [
                    {"type": "Formatted Text", "url": "https://example.gov/undated.htm"}]}
            ]}"#,
        )
        .expect("parse");

        let latest = response.latest().expect("latest");
        assert_eq!(latest.parsed_date(), NaiveDate::from_ymd_opt(2024, 9, 10));
        assert_eq!(
            latest.url_for("Formatted Text").as_deref(),
            Some("https://example.gov/eh.htm")
        );
        assert_eq!(
            latest.url_for("PDF").as_deref(),
            Some("https://example.gov/eh.pdf")
        );
        assert!(latest.url_for("Formatted XML").is_none());
    }
}
