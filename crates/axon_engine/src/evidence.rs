//! Evidence tracking.
//!
//! Every transduction result carries a bipartite provenance graph: output
//! slots on one side, the input slots that justified them on the other.
//! The graph is local to a single `apply` call and owned by its result -
//! graphs from unrelated calls are never merged.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a transduction contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContractId(Uuid);

impl ContractId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Placeholder id for links recorded inside a mapping, before the
    /// engine stamps them with the producing contract.
    pub fn unassigned() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One provenance edge: an output slot and the input slots that justified
/// its value, stamped with the contract that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub output_slot: String,
    pub input_slots: BTreeSet<String>,
    pub contract: ContractId,
}

/// The accumulated provenance graph for one `apply` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceGraph {
    links: Vec<EvidenceLink>,
}

impl EvidenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one link. Links recorded here carry the unassigned contract
    /// id until [`EvidenceGraph::assign_contract`] stamps them.
    pub fn record<I, S>(&mut self, output_slot: impl Into<String>, input_slots: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links.push(EvidenceLink {
            output_slot: output_slot.into(),
            input_slots: input_slots.into_iter().map(Into::into).collect(),
            contract: ContractId::unassigned(),
        });
    }

    /// Append a fully formed link.
    pub fn push(&mut self, link: EvidenceLink) {
        self.links.push(link);
    }

    /// Stamp every unassigned link with the producing contract.
    pub fn assign_contract(&mut self, contract: ContractId) {
        for link in &mut self.links {
            if link.contract.is_unassigned() {
                link.contract = contract;
            }
        }
    }

    pub fn links(&self) -> &[EvidenceLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links justifying a given output slot.
    pub fn for_slot(&self, output_slot: &str) -> Vec<&EvidenceLink> {
        self.links
            .iter()
            .filter(|l| l.output_slot == output_slot)
            .collect()
    }

    pub fn has_link_for(&self, output_slot: &str) -> bool {
        self.links.iter().any(|l| l.output_slot == output_slot)
    }

    /// Concatenate another graph's links into this one.
    pub fn extend_from(&mut self, other: &EvidenceGraph) {
        self.links.extend(other.links.iter().cloned());
    }

    /// Remove exact duplicate links, preserving first-seen order.
    pub fn dedup(&mut self) {
        let mut seen = BTreeSet::new();
        self.links.retain(|link| seen.insert(link.clone()));
    }

    /// Ultimate input slots justifying an output slot, walking through
    /// intermediate slots that are themselves link outputs. A slot with no
    /// incoming link is terminal.
    pub fn transitive_inputs(&self, output_slot: &str) -> BTreeSet<String> {
        let mut terminals = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack: Vec<String> = self
            .for_slot(output_slot)
            .iter()
            .flat_map(|l| l.input_slots.iter().cloned())
            .collect();

        while let Some(slot) = stack.pop() {
            if !visited.insert(slot.clone()) {
                continue;
            }
            let feeding = self.for_slot(&slot);
            if feeding.is_empty() {
                terminals.insert(slot);
            } else {
                for link in feeding {
                    stack.extend(link.input_slots.iter().cloned());
                }
            }
        }
        terminals
    }

    /// Transitive closure over every output slot in the graph.
    pub fn closure(&self) -> BTreeMap<String, BTreeSet<String>> {
        let outputs: BTreeSet<&str> =
            self.links.iter().map(|l| l.output_slot.as_str()).collect();
        outputs
            .into_iter()
            .map(|slot| (slot.to_string(), self.transitive_inputs(slot)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_stamp() {
        let mut graph = EvidenceGraph::new();
        graph.record("to", ["content"]);
        assert!(graph.links()[0].contract.is_unassigned());

        let id = ContractId::new();
        graph.assign_contract(id);
        assert_eq!(graph.links()[0].contract, id);

        // Already stamped links are left alone
        let other = ContractId::new();
        graph.assign_contract(other);
        assert_eq!(graph.links()[0].contract, id);
    }

    #[test]
    fn test_for_slot_and_dedup() {
        let id = ContractId::new();
        let mut graph = EvidenceGraph::new();
        graph.record("to", ["content"]);
        graph.record("to", ["content"]);
        graph.record("body", ["content", "tone"]);
        graph.assign_contract(id);

        assert_eq!(graph.for_slot("to").len(), 2);
        graph.dedup();
        assert_eq!(graph.for_slot("to").len(), 1);
        assert_eq!(graph.len(), 2);
        assert!(graph.has_link_for("body"));
        assert!(!graph.has_link_for("subject"));
    }

    #[test]
    fn test_transitive_inputs_walk_intermediates() {
        // source slots: a, b; intermediate: mid; final: out
        let mut graph = EvidenceGraph::new();
        graph.record("mid", ["a", "b"]);
        graph.record("out", ["mid"]);
        graph.assign_contract(ContractId::new());

        let inputs = graph.transitive_inputs("out");
        assert_eq!(
            inputs,
            ["a", "b"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_transitive_inputs_terminates_on_cycles() {
        // Pathological pass-through naming must not loop forever
        let mut graph = EvidenceGraph::new();
        graph.record("x", ["x"]);
        graph.assign_contract(ContractId::new());
        let inputs = graph.transitive_inputs("x");
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_closure() {
        let mut graph = EvidenceGraph::new();
        graph.record("mid", ["a"]);
        graph.record("out", ["mid"]);
        graph.assign_contract(ContractId::new());

        let closure = graph.closure();
        assert_eq!(closure["out"], ["a".to_string()].into_iter().collect());
        assert_eq!(closure["mid"], ["a".to_string()].into_iter().collect());
    }
}
