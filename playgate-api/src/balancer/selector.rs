//! Multi-prefix node selection.
//!
//! Every candidate prefix is probed in its own task, with the source probe
//! and the best-node probe running side by side. The selector always waits
//! for all prefixes before answering.

use std::sync::Arc;

use playgate_core::{
    qualified_stream_id, GeoPoint, NodeProber, ProbeError, ProbeFailure, ProbeRequest,
    SelectionResult,
};
use tokio::task::JoinSet;

use crate::telemetry::metrics;

/// Both probe outcomes for one prefix.
#[derive(Debug)]
struct PrefixOutcome {
    prefix: String,
    source: Result<String, ProbeFailure>,
    best: Result<String, ProbeFailure>,
}

/// Picks the node a viewer should play from.
pub struct NodeSelector<P> {
    prober: Arc<P>,
}

impl<P> Clone for NodeSelector<P> {
    fn clone(&self) -> Self {
        Self {
            prober: Arc::clone(&self.prober),
        }
    }
}

impl<P: NodeProber> NodeSelector<P> {
    pub fn new(prober: P) -> Self {
        Self::from_arc(Arc::new(prober))
    }

    pub fn from_arc(prober: Arc<P>) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Select a node for `stream_id` across `prefixes`.
    ///
    /// Resolution order:
    /// 1. the first prefix (in completion order) whose best-node probe
    ///    succeeded, qualified with that prefix;
    /// 2. otherwise the first node named alongside a failure, qualified with
    ///    `fallback_prefix` (default: the first prefix), carrying that error;
    /// 3. otherwise no node and the last error seen.
    #[tracing::instrument(skip(self, prefixes, location), fields(prefixes = prefixes.len()))]
    pub async fn get_best_node(
        &self,
        prefixes: &[String],
        stream_id: &str,
        location: Option<GeoPoint>,
        fallback_prefix: Option<&str>,
    ) -> SelectionResult {
        let Some(first_prefix) = prefixes.first() else {
            record_outcome("no_candidates");
            return SelectionResult::failed(ProbeError::NoCandidates);
        };

        let mut tasks = JoinSet::new();
        for prefix in prefixes {
            let prober = Arc::clone(&self.prober);
            let request = ProbeRequest::new(prefix.clone(), stream_id).with_location(location);
            tasks.spawn(async move { probe_prefix(prober.as_ref(), request).await });
        }

        let mut winner: Option<SelectionResult> = None;
        let mut fallback: Option<(String, ProbeError)> = None;
        let mut last_error: Option<ProbeError> = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "probe task failed");
                    last_error = Some(ProbeError::Transport {
                        reason: format!("probe task failed: {}", err),
                    });
                    continue;
                }
            };

            let source_confirmed = outcome.source.is_ok();
            if let Err(failure) = outcome.source {
                note_failure(failure, &mut fallback, &mut last_error);
            }

            match outcome.best {
                Ok(address) => {
                    if winner.is_none() {
                        winner = Some(SelectionResult::winner(
                            address,
                            qualified_stream_id(&outcome.prefix, stream_id),
                            source_confirmed,
                        ));
                    }
                }
                Err(failure) => note_failure(failure, &mut fallback, &mut last_error),
            }
        }

        if let Some(winner) = winner {
            tracing::debug!(node = %winner.node_address, stream = %winner.stream_id, "node selected");
            record_outcome("winner");
            return winner;
        }

        if let Some((address, error)) = fallback {
            let prefix = fallback_prefix.unwrap_or(first_prefix);
            tracing::info!(node = %address, error = %error, "falling back to node without origin");
            record_outcome("fallback");
            return SelectionResult::fallback(address, qualified_stream_id(prefix, stream_id), error);
        }

        let error = last_error.unwrap_or(ProbeError::NoCandidates);
        tracing::warn!(error = %error, "no node available");
        record_outcome("failed");
        SelectionResult::failed(error)
    }
}

impl<P> std::fmt::Debug for NodeSelector<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSelector").finish_non_exhaustive()
    }
}

async fn probe_prefix<P: NodeProber + ?Sized>(prober: &P, request: ProbeRequest) -> PrefixOutcome {
    let source_request = request.clone().source_only(true);
    let (source, best) = tokio::join!(prober.probe(&source_request), prober.probe(&request));
    PrefixOutcome {
        prefix: request.prefix,
        source,
        best,
    }
}

fn note_failure(
    failure: ProbeFailure,
    fallback: &mut Option<(String, ProbeError)>,
    last_error: &mut Option<ProbeError>,
) {
    if let (None, Some(address)) = (fallback.as_ref(), failure.address) {
        *fallback = Some((address, failure.error.clone()));
    }
    *last_error = Some(failure.error);
}

fn record_outcome(outcome: &str) {
    if let Some(metrics) = metrics() {
        metrics.record_selection(outcome);
    }
}
