mod claude;

pub use claude::Claude;

use regex::Regex;

use crate::error::Result;
use crate::models::{BillAction, BillKey, Importance};

/// Labels a bill's importance from its metadata and action history.
#[allow(async_fn_in_trait)]
pub trait Classifier {
    /// Returns the model's raw reply; callers extract the label from it.
    async fn classify_importance(
        &self,
        key: BillKey,
        title: &str,
        actions: &[BillAction],
    ) -> Result<String>;
}

/// Produces a prose summary of a bill's current text.
#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize_bill(
        &self,
        key: BillKey,
        title: &str,
        actions: &[BillAction],
        text: &str,
    ) -> Result<String>;

    fn model_version(&self) -> &str;
}

/// Importance that can be assigned without asking a model: a latest action
/// involving the President or a public law is always Must Know.
pub fn automatic_importance(latest_action_text: &str) -> Option<Importance> {
    let pattern = Regex::new(r"(?i)\b(President|Public Law)\b").ok()?;
    if pattern.is_match(latest_action_text) {
        Some(Importance::MustKnow)
    } else {
        None
    }
}

/// Extract an importance label from a model reply. The trimmed reply is
/// tried verbatim first, then the first label mentioned anywhere in it.
pub fn parse_importance(reply: &str) -> Option<Importance> {
    if let Ok(importance) = reply.trim().parse() {
        return Some(importance);
    }
    let pattern = Regex::new(r"\b(Must Know|Important|Minimal)\b").ok()?;
    pattern.find(reply).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels_parse() {
        assert_eq!(parse_importance("Must Know"), Some(Importance::MustKnow));
        assert_eq!(
            parse_importance("  Important \n"),
            Some(Importance::Important)
        );
        assert_eq!(parse_importance("Minimal"), Some(Importance::Minimal));
    }

    #[test]
    fn labels_are_extracted_from_wrapped_replies() {
        assert_eq!(
            parse_importance("This bill is rated \"Must Know\" given its scope."),
            Some(Importance::MustKnow)
        );
        assert_eq!(
            parse_importance("Importance: Minimal."),
            Some(Importance::Minimal)
        );
    }

    #[test]
    fn unrelated_replies_parse_to_nothing() {
        assert_eq!(parse_importance("I cannot assess this bill."), None);
        assert_eq!(parse_importance(""), None);
    }

    #[test]
    fn presidential_actions_skip_the_model() {
        assert_eq!(
            automatic_importance("Signed by President."),
            Some(Importance::MustKnow)
        );
        assert_eq!(
            automatic_importance("Became Public Law No: 118-64."),
            Some(Importance::MustKnow)
        );
        assert_eq!(
            automatic_importance("Referred to the Committee on the Judiciary."),
            None
        );
    }
}
