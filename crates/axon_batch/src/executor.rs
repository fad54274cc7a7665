//! Concurrent map/reduce over transduction contracts.
//!
//! Design principles:
//! - One logical task per batch element; elements are mutually independent
//!   and never observe each other's outcome
//! - Concurrency is bounded by a caller-supplied policy - the executor
//!   never spawns unbounded backend calls regardless of input size
//! - Each task writes its outcome to its own reserved position, so the
//!   result is positionally aligned with the input whatever the
//!   completion order
//! - One element's failure is recorded at its position and nothing else;
//!   the caller decides whether a partially failed batch is acceptable
//! - Cancellation is cooperative: in-flight calls are abandoned
//!   best-effort, finished positions are retained, unfinished positions
//!   are marked `Cancelled` (a distinct outcome, not an error)

use std::sync::Arc;

use axon_backend::GenerativeBackend;
use axon_engine::{Transduction, TransductionError, TransductionResult};
use axon_schema::{Record, RecordSchema, SchemaViolation};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;

/// Default concurrency bound when the caller supplies no policy of its own.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Caller-supplied resource policy for batch execution.
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    /// Maximum number of elements in flight at once (minimum 1)
    pub concurrency: usize,
}

impl ExecutionPolicy {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// Outcome of one batch element.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The contract produced a valid target instance with evidence
    Success(TransductionResult),

    /// The contract returned a typed error for this element
    Failed(TransductionError),

    /// The element was terminated by caller-initiated cancellation
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn success(&self) -> Option<&TransductionResult> {
        match self {
            Outcome::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransductionError> {
        match self {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Outcomes positionally aligned with the input collection.
#[derive(Debug)]
pub struct BatchResult {
    outcomes: Vec<Outcome>,
}

impl BatchResult {
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Outcome> {
        self.outcomes.get(position)
    }

    /// Successful results with their positions.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &TransductionResult)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.success().map(|r| (i, r)))
    }

    /// Failures with their positions.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &TransductionError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.error().map(|e| (i, e)))
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_cancelled()).count()
    }

    pub fn is_fully_successful(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }
}

/// Apply a contract to every element of a collection concurrently.
///
/// The returned result has exactly one outcome per input element, in
/// input order.
pub async fn map(
    contract: &Arc<Transduction>,
    backend: &Arc<dyn GenerativeBackend>,
    sources: Vec<Record>,
    policy: &ExecutionPolicy,
    token: &CancellationToken,
) -> BatchResult {
    let total = sources.len();
    debug!(
        contract = %contract.name,
        total,
        concurrency = policy.concurrency,
        "starting batch map"
    );

    let semaphore = Arc::new(Semaphore::new(policy.concurrency));
    let mut handles = Vec::with_capacity(total);

    for (index, source) in sources.into_iter().enumerate() {
        let contract = contract.clone();
        let backend = backend.clone();
        let semaphore = semaphore.clone();
        let token = token.clone();

        let handle = tokio::spawn(async move {
            // Elements that never started still resolve as Cancelled
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Outcome::Cancelled,
                },
            };
            let _permit = permit;

            tokio::select! {
                biased;
                _ = token.cancelled() => Outcome::Cancelled,
                result = contract.apply(backend.as_ref(), &source) => match result {
                    Ok(result) => Outcome::Success(result),
                    Err(error) => Outcome::Failed(error),
                },
            }
        });
        handles.push((index, handle));
    }

    let mut outcomes: Vec<Outcome> = (0..total).map(|_| Outcome::Cancelled).collect();
    for (index, handle) in handles {
        match handle.await {
            Ok(outcome) => outcomes[index] = outcome,
            Err(join_error) => {
                // A panicking mapping must not take the batch down with it
                warn!(index, error = %join_error, "batch element task failed");
                outcomes[index] = Outcome::Failed(TransductionError::Mapping(format!(
                    "element task failed: {join_error}"
                )));
            }
        }
    }

    debug!(
        contract = %contract.name,
        successes = outcomes.iter().filter(|o| o.is_success()).count(),
        "batch map finished"
    );
    BatchResult { outcomes }
}

/// Aggregate a collection of records through a reduce contract.
///
/// The contract's source type must be a list wrapper (a single `items`
/// record-list slot, see `RecordSchema::list_of`); its target type is the
/// aggregate. Any error is fatal to the whole reduce call - there is no
/// smaller unit to isolate to.
pub async fn reduce(
    contract: &Transduction,
    backend: &dyn GenerativeBackend,
    items: Vec<Record>,
) -> Result<TransductionResult, TransductionError> {
    let source = collect_items(&contract.source, items)?;
    contract.apply(backend, &source).await
}

/// Staged reduction: reduce fixed-size windows of the collection
/// (concurrently, bounded by the policy), then re-reduce the intermediate
/// aggregates until a single aggregate remains.
///
/// Requires a self-reducing contract - its target type must equal the
/// item type of its list-shaped source - and does not make the reduction
/// associative by itself: the contract must tolerate staged application.
pub async fn reduce_windowed(
    contract: &Arc<Transduction>,
    backend: &Arc<dyn GenerativeBackend>,
    mut items: Vec<Record>,
    window: usize,
    policy: &ExecutionPolicy,
) -> Result<TransductionResult, TransductionError> {
    let window = window.max(2);
    let item_schema = list_item_schema(&contract.source)?;

    loop {
        if items.len() <= window {
            return reduce(contract, backend.as_ref(), items).await;
        }

        if contract.target.content_hash != item_schema.content_hash {
            return Err(TransductionError::Validation(
                SchemaViolation::SchemaMismatch {
                    expected: item_schema.name.clone(),
                    got: contract.target.name.clone(),
                },
            ));
        }

        debug!(
            contract = %contract.name,
            items = items.len(),
            window,
            "reducing one stage"
        );

        let chunks: Vec<Vec<Record>> = items.chunks(window).map(|c| c.to_vec()).collect();
        let semaphore = Arc::new(Semaphore::new(policy.concurrency));
        let mut handles = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let contract = contract.clone();
            let backend = backend.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                reduce(&contract, backend.as_ref(), chunk).await
            }));
        }

        let mut aggregates = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle.await.map_err(|join_error| {
                TransductionError::Mapping(format!("reduce task failed: {join_error}"))
            })??;
            aggregates.push(result.record);
        }
        items = aggregates;
    }
}

/// Wrap a collection into the contract's list-shaped source instance.
fn collect_items(
    list_schema: &Arc<RecordSchema>,
    items: Vec<Record>,
) -> Result<Record, TransductionError> {
    if !list_schema.has_slot("items") {
        return Err(TransductionError::Validation(SchemaViolation::NoSuchSlot {
            schema: list_schema.name.clone(),
            slot: "items".to_string(),
        }));
    }
    Record::builder(list_schema.clone())
        .record_list("items", items)
        .build()
        .map_err(Into::into)
}

/// Item schema of a list-shaped reduce source.
fn list_item_schema(
    list_schema: &Arc<RecordSchema>,
) -> Result<Arc<RecordSchema>, TransductionError> {
    use axon_schema::FieldKind;
    match list_schema.slot("items").map(|s| &s.kind) {
        Some(FieldKind::RecordList(item)) => Ok(Arc::new((**item).clone())),
        _ => Err(TransductionError::Validation(SchemaViolation::NoSuchSlot {
            schema: list_schema.name.clone(),
            slot: "items".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_floors_at_one() {
        assert_eq!(ExecutionPolicy::new(0).concurrency, 1);
        assert_eq!(ExecutionPolicy::new(5).concurrency, 5);
        assert_eq!(ExecutionPolicy::default().concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_outcome_accessors() {
        let cancelled = Outcome::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_success());
        assert!(cancelled.success().is_none());

        let failed = Outcome::Failed(TransductionError::Mapping("x".into()));
        assert!(failed.is_failed());
        assert!(failed.error().is_some());
    }

    #[test]
    fn test_collect_items_requires_list_shape() {
        use axon_schema::FieldSlot;
        let plain = Arc::new(
            RecordSchema::new("Plain", vec![FieldSlot::text("a")]).unwrap(),
        );
        let err = collect_items(&plain, vec![]).unwrap_err();
        assert!(matches!(err, TransductionError::Validation(_)));
    }
}
