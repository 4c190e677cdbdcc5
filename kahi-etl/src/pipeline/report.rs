//! Per-identifier outcomes of a batch run

use crate::error::{ProcessError, SkipReason};
use crate::types::WorkIdentifier;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Result of processing one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Inserted { id: Uuid },
    Skipped { reason: String },
    Failed { error: String },
}

impl From<&Result<Uuid, ProcessError>> for Outcome {
    fn from(result: &Result<Uuid, ProcessError>) -> Self {
        match result {
            Ok(id) => Outcome::Inserted { id: *id },
            Err(ProcessError::Skipped(reason)) => Outcome::Skipped {
                reason: reason.to_string(),
            },
            Err(e) => Outcome::Failed { error: e.to_string() },
        }
    }
}

impl From<SkipReason> for Outcome {
    fn from(reason: SkipReason) -> Self {
        Outcome::Skipped {
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub identifier: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Outcomes of a batch in submission order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
    /// Identifiers never started because the run was cancelled
    pub cancelled: usize,
}

impl BatchReport {
    pub fn push(&mut self, identifier: &WorkIdentifier, outcome: Outcome) {
        self.entries.push(ReportEntry {
            identifier: identifier.to_string(),
            outcome,
        });
    }

    pub fn inserted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Inserted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Inserted { id } => write!(f, "inserted {}", id),
            Outcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            Outcome::Failed { error } => write!(f, "FAILED: {}", error),
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}\t{}", entry.identifier, entry.outcome)?;
        }
        write!(
            f,
            "{} inserted, {} skipped, {} failed",
            self.inserted(),
            self.skipped(),
            self.failed()
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    #[test]
    fn test_counts_by_outcome() {
        let mut report = BatchReport::default();
        let id = kahi_common::uuid_utils::generate();
        report.push(&WorkIdentifier::doi("10.1/a"), (&Ok(id)).into());
        report.push(
            &WorkIdentifier::doi("10.1/b"),
            (&Err(ProcessError::Skipped(SkipReason::NoProviderData))).into(),
        );
        report.push(
            &WorkIdentifier::doi("10.1/c"),
            (&Err(ProcessError::MissingNormalizer(Provider::Lens))).into(),
        );

        assert_eq!((report.inserted(), report.skipped(), report.failed()), (1, 1, 1));
        assert_eq!(report.entries[1].identifier, "doi:10.1/b");
        assert!(report.to_string().ends_with("1 inserted, 1 skipped, 1 failed"));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = ReportEntry {
            identifier: "doi:10.1/x".into(),
            outcome: Outcome::Skipped { reason: "no provider reported data".into() },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["identifier"], "doi:10.1/x");
    }
}
