use chrono::NaiveDate;

use crate::models::{Bill, BillCandidate};

/// Disposition of one candidate record against its stored counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// No stored counterpart exists for the natural key.
    New,
    /// The stored copy is outdated and must be replaced.
    StaleUpdate,
    /// The stored copy is as new as the candidate. Leave it alone.
    Current,
    /// The candidate is malformed and must be skipped without touching
    /// the store. Assigned by callers when the natural key fails to parse;
    /// the comparison functions below never produce it.
    Ignore,
}

/// Metadata sync mode: staleness is governed by the provider's update
/// stamp. A candidate with no parsable stamp never displaces stored data.
pub fn by_update_date(candidate: &BillCandidate, stored: Option<&Bill>) -> Staleness {
    let Some(stored) = stored else {
        return Staleness::New;
    };
    match (candidate.update_date, stored.update_date) {
        (None, _) => Staleness::Current,
        (Some(_), None) => Staleness::StaleUpdate,
        (Some(incoming), Some(have)) if incoming > have => Staleness::StaleUpdate,
        _ => Staleness::Current,
    }
}

/// Content mode: staleness is governed by content-relevant dates, used by
/// the text cache where legislative action dates drive refreshes. The two
/// modes are deliberately separate entry points.
pub fn by_content_date(incoming: NaiveDate, cached: Option<NaiveDate>) -> Staleness {
    match cached {
        None => Staleness::New,
        Some(have) if incoming > have => Staleness::StaleUpdate,
        Some(_) => Staleness::Current,
    }
}
