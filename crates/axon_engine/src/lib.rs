//! Transduction Engine
//!
//! # Philosophy: the contract is the contract
//!
//! A transduction is a typed mapping from a source record type to a target
//! record type. Once constructed it is immutable; applying it to a valid
//! source instance yields exactly one of:
//!
//! - a target instance that conforms to the target schema, together with
//!   an evidence graph linking every present target slot back to the input
//!   slots that justified it, or
//! - a typed error.
//!
//! Nothing partially populated ever escapes, and no slot is ever filled
//! without evidence. Contracts compose sequentially; provenance stays
//! transitive across stages.
//!
//! # Modules
//!
//! - [`contract`]: the contract itself (`Transduction`, `Route`,
//!   `TransductionOptions`, `TransductionResult`)
//! - [`compose`]: the derive-from operator (`derive`, `With`, `<<` sugar)
//! - [`evidence`]: provenance tracking (`EvidenceGraph`, `EvidenceLink`)
//! - [`error`]: the failure taxonomy (`TransductionError`)

pub mod compose;
pub mod contract;
pub mod error;
pub mod evidence;

pub use compose::{derive, Derive, With};
pub use contract::{
    explanation_schema, Mode, Route, Transduction, TransductionOptions, TransductionResult,
};
pub use error::TransductionError;
pub use evidence::{ContractId, EvidenceGraph, EvidenceLink};
