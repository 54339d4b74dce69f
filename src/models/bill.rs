use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The closed set of bill type codes used by congress.gov.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    Hr,
    S,
    Hjres,
    Sjres,
    Hconres,
    Sconres,
    Hres,
    Sres,
}

impl BillType {
    #[allow(dead_code)]
    pub const ALL: [BillType; 8] = [
        BillType::Hr,
        BillType::S,
        BillType::Hjres,
        BillType::Sjres,
        BillType::Hconres,
        BillType::Sconres,
        BillType::Hres,
        BillType::Sres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Hr => "hr",
            BillType::S => "s",
            BillType::Hjres => "hjres",
            BillType::Sjres => "sjres",
            BillType::Hconres => "hconres",
            BillType::Sconres => "sconres",
            BillType::Hres => "hres",
            BillType::Sres => "sres",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hr" => Ok(BillType::Hr),
            "s" => Ok(BillType::S),
            "hjres" => Ok(BillType::Hjres),
            "sjres" => Ok(BillType::Sjres),
            "hconres" => Ok(BillType::Hconres),
            "sconres" => Ok(BillType::Sconres),
            "hres" => Ok(BillType::Hres),
            "sres" => Ok(BillType::Sres),
            other => Err(AppError::InvalidRecord(format!(
                "unknown bill type: {other}"
            ))),
        }
    }
}

/// Natural key of a bill: congress number, type code, bill number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillKey {
    pub congress: i64,
    pub bill_type: BillType,
    pub number: i64,
}

impl BillKey {
    pub fn new(congress: i64, bill_type: BillType, number: i64) -> Self {
        Self {
            congress,
            bill_type,
            number,
        }
    }
}

impl fmt::Display for BillKey {
    /// Renders as "118.hr.7032", the form used in logs and cache file names.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.congress, self.bill_type, self.number)
    }
}

/// Editorial weight assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    MustKnow,
    Important,
    Minimal,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::MustKnow => "Must Know",
            Importance::Important => "Important",
            Importance::Minimal => "Minimal",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Must Know" => Ok(Importance::MustKnow),
            "Important" => Ok(Importance::Important),
            "Minimal" => Ok(Importance::Minimal),
            other => Err(AppError::InvalidRecord(format!(
                "unknown importance label: {other}"
            ))),
        }
    }
}

/// A bill row as persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub key: BillKey,
    pub title: String,
    pub origin_chamber: Option<String>,
    pub origin_chamber_code: Option<String>,
    pub latest_action_date: Option<NaiveDate>,
    pub latest_action_text: Option<String>,
    pub update_date: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub actions_synced: bool,
    pub importance: Option<Importance>,
    pub tweet_created: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A bill as fetched from the provider, normalized for reconciliation.
#[derive(Debug, Clone)]
pub struct BillCandidate {
    pub key: BillKey,
    pub title: String,
    pub origin_chamber: Option<String>,
    pub origin_chamber_code: Option<String>,
    pub latest_action_date: Option<NaiveDate>,
    pub latest_action_text: Option<String>,
    pub update_date: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bill_type_round_trips_case_insensitively() {
        for ty in BillType::ALL {
            assert_eq!(ty.as_str().parse::<BillType>().unwrap(), ty);
            assert_eq!(
                ty.as_str().to_uppercase().parse::<BillType>().unwrap(),
                ty
            );
        }
        assert!("hjr".parse::<BillType>().is_err());
    }

    #[test]
    fn bill_key_displays_dotted() {
        let key = BillKey::new(118, BillType::Hr, 7032);
        assert_eq!(key.to_string(), "118.hr.7032");
    }

    #[test]
    fn importance_parses_exact_labels_only() {
        assert_eq!(
            "Must Know".parse::<Importance>().unwrap(),
            Importance::MustKnow
        );
        assert_eq!(
            " Minimal ".parse::<Importance>().unwrap(),
            Importance::Minimal
        );
        assert!("must know".parse::<Importance>().is_err());
        assert!("Critical".parse::<Importance>().is_err());
    }
}
