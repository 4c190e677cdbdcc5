//! Bounded worker pool over a batch of identifiers
//!
//! Up to `workers` pipelines run at once through
//! `futures::stream::buffer_unordered`. A failure fails its own identifier
//! and nothing else; cancellation stops new identifiers from starting while
//! the ones in flight finish.

use super::report::{BatchReport, Outcome};
use super::Pipeline;
use crate::types::WorkIdentifier;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Orchestrator {
    pipeline: Pipeline,
    workers: usize,
}

impl Orchestrator {
    pub fn new(pipeline: Pipeline, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
        }
    }

    /// Process every identifier; the report keeps submission order
    pub async fn run(&self, identifiers: Vec<WorkIdentifier>, cancel_token: &CancellationToken) -> BatchReport {
        let total = identifiers.len();
        let processed = Arc::new(AtomicUsize::new(0));

        tracing::info!(identifiers = total, workers = self.workers, "Starting batch");

        let mut results: Vec<(usize, WorkIdentifier, Option<Outcome>)> =
            stream::iter(identifiers.into_iter().enumerate())
                .map(|(index, identifier)| {
                    // each worker owns its pipeline instance
                    let pipeline = self.pipeline.clone();
                    let processed = processed.clone();
                    let cancel_token = cancel_token.clone();

                    async move {
                        if cancel_token.is_cancelled() {
                            return (index, identifier, None);
                        }

                        let result = pipeline.process(&identifier).await;
                        match &result {
                            Ok(id) => tracing::debug!(identifier = %identifier, id = %id, "Inserted"),
                            Err(e) if e.is_fatal() => {
                                tracing::error!(identifier = %identifier, error = %e, "Identifier failed")
                            }
                            Err(e) => tracing::info!(identifier = %identifier, reason = %e, "Identifier skipped"),
                        }

                        let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
                        if current % 100 == 0 || current == total {
                            tracing::info!(progress = format!("{}/{}", current, total), "Batch progress");
                        }

                        (index, identifier, Some(Outcome::from(&result)))
                    }
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        results.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::default();
        for (_, identifier, outcome) in results {
            match outcome {
                Some(outcome) => report.push(&identifier, outcome),
                None => report.cancelled += 1,
            }
        }

        tracing::info!(
            total,
            inserted = report.inserted(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Batch finished"
        );
        report
    }
}
