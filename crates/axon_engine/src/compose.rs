//! The derive-from composition operator.
//!
//! Contracts are built by deriving a target type *from* something:
//!
//! ```text
//! derive(&email) << &generic_input                  // type pair -> delegated
//! derive(&email) << With::new(&generic_input, "..") // + instructions/options
//! derive(&summary) << &existing_contract           // sequential composition
//! ```
//!
//! The method forms (`from_schema`, `from_schema_with`, `from_contract`)
//! and the `<<` forms are equivalent; `<<` is sugar.

use std::ops::Shl;
use std::sync::Arc;

use axon_schema::RecordSchema;

use crate::contract::{Transduction, TransductionOptions};

/// Entry point of the derive-from operator: the target type being derived.
pub fn derive(target: &Arc<RecordSchema>) -> Derive {
    Derive {
        target: target.clone(),
    }
}

/// A pending derivation, waiting for its source operand.
pub struct Derive {
    target: Arc<RecordSchema>,
}

impl Derive {
    /// Delegated contract with generated default instructions.
    pub fn from_schema(self, source: &Arc<RecordSchema>) -> Transduction {
        Transduction::delegated(source.clone(), self.target)
    }

    /// Delegated contract with explicit instructions and options.
    pub fn from_schema_with(
        self,
        source: &Arc<RecordSchema>,
        instructions: impl Into<String>,
        options: TransductionOptions,
    ) -> Transduction {
        Transduction::delegated(source.clone(), self.target)
            .with_instructions(instructions)
            .with_options(options)
    }

    /// Composed contract: run `existing`, then a fresh delegated contract
    /// from its target type to this derivation's target type.
    pub fn from_contract(self, existing: &Transduction) -> Transduction {
        let second = Transduction::delegated(existing.target.clone(), self.target);
        Transduction::compose_unchecked(existing.clone(), second)
    }
}

/// Source operand bundled with instructions and options, for the
/// configured form of the operator.
pub struct With {
    source: Arc<RecordSchema>,
    instructions: String,
    options: TransductionOptions,
}

impl With {
    pub fn new(source: &Arc<RecordSchema>, instructions: impl Into<String>) -> Self {
        Self {
            source: source.clone(),
            instructions: instructions.into(),
            options: TransductionOptions::default(),
        }
    }

    pub fn options(mut self, options: TransductionOptions) -> Self {
        self.options = options;
        self
    }
}

impl Shl<&Arc<RecordSchema>> for Derive {
    type Output = Transduction;

    fn shl(self, source: &Arc<RecordSchema>) -> Transduction {
        self.from_schema(source)
    }
}

impl Shl<Arc<RecordSchema>> for Derive {
    type Output = Transduction;

    fn shl(self, source: Arc<RecordSchema>) -> Transduction {
        self.from_schema(&source)
    }
}

impl Shl<With> for Derive {
    type Output = Transduction;

    fn shl(self, with: With) -> Transduction {
        let With {
            source,
            instructions,
            options,
        } = with;
        self.from_schema_with(&source, instructions, options)
    }
}

impl Shl<&Transduction> for Derive {
    type Output = Transduction;

    fn shl(self, existing: &Transduction) -> Transduction {
        self.from_contract(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Mode;
    use axon_schema::FieldSlot;

    fn schema(name: &str, slot: &str) -> Arc<RecordSchema> {
        Arc::new(RecordSchema::new(name, vec![FieldSlot::text(slot)]).unwrap())
    }

    #[test]
    fn test_type_pair_form() {
        let source = schema("Question", "text");
        let target = schema("Answer", "text");

        let contract = derive(&target) << &source;
        assert_eq!(contract.name, "Question_to_Answer");
        assert_eq!(contract.source.name, "Question");
        assert_eq!(contract.target.name, "Answer");
        assert!(matches!(contract.mode, Mode::Delegated));
        assert!(contract.instructions.contains("Question"));
    }

    #[test]
    fn test_configured_form() {
        let source = schema("Question", "text");
        let target = schema("Answer", "text");

        let contract = derive(&target)
            << With::new(&source, "Answer concisely.")
                .options(TransductionOptions::default().with_explanation());

        assert_eq!(contract.instructions, "Answer concisely.");
        assert!(contract.options.provide_explanation);
    }

    #[test]
    fn test_contract_form_composes() {
        let a = schema("A", "x");
        let b = schema("B", "y");
        let c = schema("C", "z");

        let first = derive(&b) << &a;
        let first_id = first.id;
        let composed = derive(&c) << &first;

        assert_eq!(composed.source.name, "A");
        assert_eq!(composed.target.name, "C");
        match &composed.mode {
            Mode::Composed { first, second } => {
                assert_eq!(first.id, first_id);
                assert_eq!(second.source.name, "B");
                assert_eq!(second.target.name, "C");
            }
            other => panic!("expected composed mode, got {:?}", other),
        }
        // A fresh, independent contract - not a mutation of `first`
        assert_ne!(composed.id, first_id);
    }

    #[test]
    fn test_operator_and_method_forms_agree() {
        let source = schema("Question", "text");
        let target = schema("Answer", "text");

        let sugar = derive(&target) << &source;
        let method = derive(&target).from_schema(&source);

        assert_eq!(sugar.name, method.name);
        assert_eq!(sugar.source.content_hash, method.source.content_hash);
        assert_eq!(sugar.target.content_hash, method.target.content_hash);
    }
}
