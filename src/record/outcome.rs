use crate::record::{InscriptionRecord, UNSTABLE_NUMBER};
use crate::SyncError;

/// Result of processing one reference
///
/// A failed outcome may still carry a number and a partial record when the
/// detail page was readable but a later step (content fetch) failed.
#[derive(Debug)]
pub struct Outcome {
    pub uid: String,

    /// `None` when the id heading could not be read
    pub number: Option<i64>,

    pub record: Option<InscriptionRecord>,

    pub error: Option<SyncError>,
}

impl Outcome {
    /// Outcome for a fully processed record
    pub fn completed(record: InscriptionRecord) -> Self {
        Self {
            uid: record.uid.clone(),
            number: Some(record.number),
            record: Some(record),
            error: None,
        }
    }

    /// Outcome for a reference whose processing failed
    pub fn failed(uid: impl Into<String>, partial: Option<InscriptionRecord>, error: SyncError) -> Self {
        Self {
            uid: uid.into(),
            number: partial.as_ref().map(|r| r.number),
            record: partial,
            error: Some(error),
        }
    }

    pub fn is_unstable(&self) -> bool {
        self.number == Some(UNSTABLE_NUMBER)
    }

    /// Returns true when the number is known and negative (unstable or cursed)
    pub fn is_excluded(&self) -> bool {
        self.number.is_some_and(|n| n < 0)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Number to use for ordering, `None` for negative or unknown numbers
    pub fn ordering_number(&self) -> Option<i64> {
        self.number.filter(|n| *n >= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_outcome() {
        let outcome = Outcome::completed(InscriptionRecord::new("abci0", 42));
        assert_eq!(outcome.uid, "abci0");
        assert_eq!(outcome.ordering_number(), Some(42));
        assert!(!outcome.is_failed());
    }

    #[test]
    fn test_failed_outcome_keeps_partial_number() {
        let partial = InscriptionRecord::new("abci0", 7);
        let outcome = Outcome::failed(
            "abci0",
            Some(partial),
            SyncError::Status {
                url: "http://127.0.0.1/content/abci0".to_string(),
                status: 500,
            },
        );
        assert_eq!(outcome.number, Some(7));
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_unstable_outcome_has_no_ordering_number() {
        let outcome = Outcome::completed(InscriptionRecord::new("abci0", UNSTABLE_NUMBER));
        assert!(outcome.is_unstable());
        assert_eq!(outcome.ordering_number(), None);
    }

    #[test]
    fn test_cursed_outcome_has_no_ordering_number() {
        let outcome = Outcome::completed(InscriptionRecord::new("abci0", -472));
        assert!(outcome.is_excluded());
        assert!(!outcome.is_unstable());
        assert_eq!(outcome.ordering_number(), None);
        assert_eq!(
            Outcome::completed(InscriptionRecord::new("abci0", 0)).ordering_number(),
            Some(0)
        );
    }
}
