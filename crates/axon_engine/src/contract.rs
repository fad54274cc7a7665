//! Transduction contracts.
//!
//! A `Transduction` is an immutable, named mapping from a source record
//! type to a target record type. It is built once, at configuration time,
//! and applied many times. Three modes:
//!
//! - **Algorithmic**: a local mapping function. Per call it may compute the
//!   target directly or return a [`Route::Delegate`] marker to route that
//!   specific input to the backend - one contract, mixed logic.
//! - **Delegated**: every call goes to the generative backend.
//! - **Composed**: two contracts chained; the intermediate instance is
//!   validated between stages and provenance is collapsed transitively.
//!
//! Totality: for any input that conforms to the source schema, `apply`
//! returns a valid target instance or a typed error. Local evidence: every
//! present target slot in a result carries at least one evidence link.

use axon_backend::{BackendRequest, GenerativeBackend};
use axon_schema::{FieldSlot, Record, RecordSchema, SchemaViolation};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::TransductionError;
use crate::evidence::{ContractId, EvidenceGraph, EvidenceLink};

// ============================================================================
// Options
// ============================================================================

/// Per-contract execution options.
#[derive(Debug, Clone)]
pub struct TransductionOptions {
    /// Reject backend output that does not conform to the target schema.
    /// When false, unknown slots are dropped and non-conforming slots
    /// become absent instead - values are never invented either way.
    pub strict_output: bool,

    /// Ask the backend for a structured justification and return it as a
    /// second instance alongside the target.
    pub provide_explanation: bool,

    /// For composed contracts: retain the raw per-stage links alongside
    /// the collapsed source-level graph.
    pub verbose_trace: bool,

    /// Deadline handed to the backend adapter for each delegated call.
    pub timeout: Duration,
}

impl Default for TransductionOptions {
    fn default() -> Self {
        Self {
            strict_output: true,
            provide_explanation: false,
            verbose_trace: false,
            timeout: Duration::from_secs(60),
        }
    }
}

impl TransductionOptions {
    /// Accept non-conforming backend output best-effort instead of failing
    pub fn lenient_output(mut self) -> Self {
        self.strict_output = false;
        self
    }

    /// Request a structured explanation with each delegated call
    pub fn with_explanation(mut self) -> Self {
        self.provide_explanation = true;
        self
    }

    /// Keep the full per-stage evidence trace on composed contracts
    pub fn with_verbose_trace(mut self) -> Self {
        self.verbose_trace = true;
        self
    }

    /// Set the per-call backend deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Routing marker
// ============================================================================

/// Decision returned by an algorithmic mapping: either the finished target
/// instance, or an instruction to route this input to the backend.
#[derive(Debug, Clone)]
pub enum Route {
    /// The mapping computed the target itself
    Direct(Record),

    /// Send this source instance to the generative backend instead
    Delegate(Record),
}

/// Signature of an algorithmic mapping.
///
/// The mapping may record fine-grained evidence links; present output
/// slots it leaves unlinked are attributed to the full active input set.
pub type MappingFn =
    dyn Fn(&Record, &mut EvidenceGraph) -> Result<Route, TransductionError> + Send + Sync;

/// How a contract produces its target.
#[derive(Clone)]
pub enum Mode {
    /// Local mapping function (may still delegate per call)
    Algorithmic(Arc<MappingFn>),
    /// Every call goes to the backend
    Delegated,
    /// Sequential chain of two contracts
    Composed {
        first: Arc<Transduction>,
        second: Arc<Transduction>,
    },
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Algorithmic(_) => f.write_str("Algorithmic"),
            Mode::Delegated => f.write_str("Delegated"),
            Mode::Composed { first, second } => f
                .debug_struct("Composed")
                .field("first", &first.name)
                .field("second", &second.name)
                .finish(),
        }
    }
}

// ============================================================================
// Result
// ============================================================================

/// The output of one `apply` call: the validated target instance, its
/// provenance graph, and the optional explanation instance.
#[derive(Debug, Clone)]
pub struct TransductionResult {
    pub record: Record,
    pub evidence: EvidenceGraph,
    pub explanation: Option<Record>,
}

/// Schema of the structured explanation instance returned when
/// `provide_explanation` is set.
pub fn explanation_schema() -> Arc<RecordSchema> {
    let slots = vec![
        FieldSlot::text("reasoning")
            .with_description("How the target fields were inferred from the source"),
        FieldSlot::number("confidence")
            .with_description("Certainty of the transduction, 0.0 to 1.0"),
    ];
    Arc::new(RecordSchema::new("Explanation", slots).expect("statically valid schema"))
}

// ============================================================================
// Contract
// ============================================================================

/// A typed, evidence-tracked mapping from one record type to another.
///
/// Immutable after construction; composing contracts produces a new,
/// independent contract with no shared mutable state.
#[derive(Debug, Clone)]
pub struct Transduction {
    /// Unique identity, stamped onto every evidence link it produces
    pub id: ContractId,

    /// Contract name (auto-derived from the type pair unless overridden)
    pub name: String,

    /// Declared source type
    pub source: Arc<RecordSchema>,

    /// Declared target type
    pub target: Arc<RecordSchema>,

    /// Task instructions consumed by the backend on delegated calls
    pub instructions: String,

    /// Execution options
    pub options: TransductionOptions,

    /// When this contract was constructed
    pub created_at: DateTime<Utc>,

    /// How the target is produced
    pub mode: Mode,
}

impl Transduction {
    /// A contract that delegates every call to the backend, with generated
    /// default instructions.
    pub fn delegated(source: Arc<RecordSchema>, target: Arc<RecordSchema>) -> Self {
        let name = format!("{}_to_{}", source.name, target.name);
        let instructions = default_instructions(&source, &target);
        Self {
            id: ContractId::new(),
            name,
            source,
            target,
            instructions,
            options: TransductionOptions::default(),
            created_at: Utc::now(),
            mode: Mode::Delegated,
        }
    }

    /// A contract wrapping a local mapping function.
    pub fn algorithmic(
        name: impl Into<String>,
        source: Arc<RecordSchema>,
        target: Arc<RecordSchema>,
        mapping: impl Fn(&Record, &mut EvidenceGraph) -> Result<Route, TransductionError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let instructions = default_instructions(&source, &target);
        Self {
            id: ContractId::new(),
            name: name.into(),
            source,
            target,
            instructions,
            options: TransductionOptions::default(),
            created_at: Utc::now(),
            mode: Mode::Algorithmic(Arc::new(mapping)),
        }
    }

    /// Chain two contracts: `first` then `second`.
    ///
    /// The stages must agree on the intermediate type.
    pub fn compose(first: &Transduction, second: &Transduction) -> Result<Self, TransductionError> {
        if second.source.content_hash != first.target.content_hash {
            return Err(TransductionError::Composition {
                stage: second.name.clone(),
                violation: SchemaViolation::SchemaMismatch {
                    expected: second.source.name.clone(),
                    got: first.target.name.clone(),
                },
            });
        }
        Ok(Self::compose_unchecked(first.clone(), second.clone()))
    }

    /// Chain without the intermediate-type check; callers must guarantee
    /// `second.source` is `first.target`.
    pub(crate) fn compose_unchecked(first: Transduction, second: Transduction) -> Self {
        let name = format!("{}_then_{}", first.name, second.name);
        let source = first.source.clone();
        let target = second.target.clone();
        let options = second.options.clone();
        Self {
            id: ContractId::new(),
            name,
            source,
            target,
            instructions: String::new(),
            options,
            created_at: Utc::now(),
            mode: Mode::Composed {
                first: Arc::new(first),
                second: Arc::new(second),
            },
        }
    }

    /// Override the contract name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the instructions sent to the backend
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Override the execution options
    pub fn with_options(mut self, options: TransductionOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply the contract to one source instance.
    ///
    /// Returns either a valid target instance with its evidence graph, or
    /// a typed error - never an unhandled fault. Boxed so composed
    /// contracts can recurse.
    pub fn apply<'a>(
        &'a self,
        backend: &'a dyn GenerativeBackend,
        source: &'a Record,
    ) -> Pin<Box<dyn Future<Output = Result<TransductionResult, TransductionError>> + Send + 'a>>
    {
        Box::pin(self.apply_inner(backend, source))
    }

    async fn apply_inner(
        &self,
        backend: &dyn GenerativeBackend,
        source: &Record,
    ) -> Result<TransductionResult, TransductionError> {
        if source.schema().content_hash != self.source.content_hash {
            return Err(SchemaViolation::SchemaMismatch {
                expected: self.source.name.clone(),
                got: source.schema().name.clone(),
            }
            .into());
        }

        debug!(contract = %self.name, "applying transduction");
        match &self.mode {
            Mode::Algorithmic(mapping) => {
                let mut evidence = EvidenceGraph::new();
                match (mapping.as_ref())(source, &mut evidence)? {
                    Route::Direct(record) => self.finish_direct(source, record, evidence),
                    Route::Delegate(delegated) => {
                        if delegated.schema().content_hash != self.source.content_hash {
                            return Err(SchemaViolation::SchemaMismatch {
                                expected: self.source.name.clone(),
                                got: delegated.schema().name.clone(),
                            }
                            .into());
                        }
                        self.delegate(backend, &delegated).await
                    }
                }
            }
            Mode::Delegated => self.delegate(backend, source).await,
            Mode::Composed { first, second } => {
                self.apply_composed(backend, source, first, second).await
            }
        }
    }

    /// Wrap up a directly computed target instance.
    fn finish_direct(
        &self,
        source: &Record,
        record: Record,
        mut evidence: EvidenceGraph,
    ) -> Result<TransductionResult, TransductionError> {
        if record.schema().content_hash != self.target.content_hash {
            return Err(SchemaViolation::SchemaMismatch {
                expected: self.target.name.clone(),
                got: record.schema().name.clone(),
            }
            .into());
        }
        self.settle_evidence(source, &record, &mut evidence);
        Ok(TransductionResult {
            record,
            evidence,
            explanation: None,
        })
    }

    /// Route one source instance to the backend and validate its answer.
    async fn delegate(
        &self,
        backend: &dyn GenerativeBackend,
        source: &Record,
    ) -> Result<TransductionResult, TransductionError> {
        let request = BackendRequest {
            source: source.to_json(),
            source_schema: source.schema().to_json_schema(),
            target_schema: self.target.to_json_schema(),
            instructions: self.instructions.clone(),
            want_explanation: self.options.provide_explanation,
            timeout: self.options.timeout,
        };

        debug!(contract = %self.name, backend = backend.name(), "delegating to backend");
        let response = backend.transduce(request).await?;

        // A non-conforming instance is an execution failure on the strict
        // path, a best-effort partial fill on the lenient one.
        let record = if self.options.strict_output {
            Record::from_json(self.target.clone(), &response.instance)?
        } else {
            Record::from_json_lossy(self.target.clone(), &response.instance)
        };

        let mut evidence = EvidenceGraph::new();
        if let Some(provenance) = &response.provenance {
            for (slot, inputs) in provenance {
                evidence.record(slot.clone(), inputs.iter().cloned());
            }
        }
        self.settle_evidence(source, &record, &mut evidence);

        let explanation = if self.options.provide_explanation {
            response
                .explanation
                .as_ref()
                .map(|json| Record::from_json_lossy(explanation_schema(), json))
        } else {
            None
        };

        Ok(TransductionResult {
            record,
            evidence,
            explanation,
        })
    }

    /// Run the two stages of a composed contract.
    async fn apply_composed(
        &self,
        backend: &dyn GenerativeBackend,
        source: &Record,
        first: &Arc<Transduction>,
        second: &Arc<Transduction>,
    ) -> Result<TransductionResult, TransductionError> {
        let intermediate = first.apply(backend, source).await?;

        // Rebase onto the second stage's declared source type. Absent
        // intermediate slots stay absent - absence propagates, it does not
        // abort the pipeline. A shape mismatch here is fatal to this call.
        let rebased = Record::from_json(second.source.clone(), &intermediate.record.to_json())
            .map_err(|violation| TransductionError::Composition {
                stage: second.name.clone(),
                violation,
            })?;

        let finished = second.apply(backend, &rebased).await?;

        // Collapse provenance through the intermediate slots so every final
        // link points at the ultimate source slots.
        let mut evidence = EvidenceGraph::new();
        for link in finished.evidence.links() {
            let mut inputs = BTreeSet::new();
            for mid in &link.input_slots {
                for feeding in intermediate.evidence.for_slot(mid) {
                    inputs.extend(feeding.input_slots.iter().cloned());
                }
            }
            evidence.push(EvidenceLink {
                output_slot: link.output_slot.clone(),
                input_slots: inputs,
                contract: self.id,
            });
        }
        evidence.dedup();

        if self.options.verbose_trace {
            evidence.extend_from(&intermediate.evidence);
            evidence.extend_from(&finished.evidence);
            evidence.dedup();
        }

        Ok(TransductionResult {
            record: finished.record,
            evidence,
            explanation: finished.explanation,
        })
    }

    /// Enforce the local-evidence invariant on a finished result:
    /// - links for absent output slots are dropped
    /// - input references outside the source schema are dropped
    /// - present output slots left unlinked are attributed to the full
    ///   active input set
    fn settle_evidence(&self, source: &Record, record: &Record, evidence: &mut EvidenceGraph) {
        let source_slots: BTreeSet<String> = source
            .schema()
            .slot_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut settled = EvidenceGraph::new();
        for link in evidence.links() {
            if !record.is_present(&link.output_slot) {
                continue;
            }
            settled.push(EvidenceLink {
                output_slot: link.output_slot.clone(),
                input_slots: link
                    .input_slots
                    .iter()
                    .filter(|s| source_slots.contains(*s))
                    .cloned()
                    .collect(),
                contract: link.contract,
            });
        }

        let active = source.present_slots();
        for slot in record.present_slots() {
            if !settled.has_link_for(&slot) {
                settled.push(EvidenceLink {
                    output_slot: slot,
                    input_slots: active.clone(),
                    contract: ContractId::unassigned(),
                });
            }
        }

        settled.assign_contract(self.id);
        settled.dedup();
        *evidence = settled;
    }
}

fn default_instructions(source: &RecordSchema, target: &RecordSchema) -> String {
    format!(
        "Transduce instances of {} into instances of {}. Fill every target \
         field the source gives evidence for; leave the rest null.",
        source.name, target.name
    )
}
