//! Selective regeneration scope.
//!
//! A selection names operations and entities; it is closed over everything
//! those elements depend on so the projector sees a self-consistent subset.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::literals;
use crate::models::{Constraint, Field, SpecDocument};

/// The closed set of elements a selective run projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSelection {
    pub operations: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    pub enums: BTreeSet<String>,
    pub custom_types: BTreeSet<String>,
    pub rules: BTreeSet<String>,
}

impl ScopeSelection {
    /// Resolve requested operation/entity names and their dependencies.
    pub fn resolve<S: AsRef<str>>(doc: &SpecDocument, names: &[S]) -> SpecResult<Self> {
        let mut scope = Self::default();
        let mut pending_types = Vec::new();

        for name in names {
            let name = name.as_ref();
            if let Some(op) = doc.operation(name) {
                scope.operations.insert(op.name.clone());
                for param in op.input.all() {
                    Self::field_dependencies(param, &mut pending_types);
                }
                for response in op.success.iter().chain(op.failures.iter()) {
                    if let Some(ty) = &response.ty {
                        pending_types.push(ty.base_name().to_string());
                    }
                }
                for rule in doc.rules_for(&op.name) {
                    scope.rules.insert(rule.name.clone());
                    for clause in &rule.clauses {
                        for text in [&clause.when, &clause.then] {
                            pending_types.extend(literals::qualified_pairs(text).into_iter().map(|(q, _)| q));
                        }
                    }
                }
            } else if doc.entity(name).is_some() {
                pending_types.push(name.to_string());
            } else {
                return Err(SpecError::UnknownScopeElement(name.to_string()));
            }
        }

        // Transitive closure over schema types.
        while let Some(name) = pending_types.pop() {
            if let Some(entity) = doc.entity(&name) {
                if scope.entities.insert(name) {
                    for field in &entity.fields {
                        Self::field_dependencies(field, &mut pending_types);
                    }
                }
            } else if doc.enum_def(&name).is_some() {
                scope.enums.insert(name);
            } else if let Some(ty) = doc.custom_type(&name) {
                if scope.custom_types.insert(name) {
                    pending_types.extend(ty.base.iter().cloned());
                }
            }
        }

        debug!(
            "Scope resolved: {} operations, {} entities, {} enums, {} custom types, {} rules",
            scope.operations.len(),
            scope.entities.len(),
            scope.enums.len(),
            scope.custom_types.len(),
            scope.rules.len()
        );
        Ok(scope)
    }

    fn field_dependencies(field: &Field, pending: &mut Vec<String>) {
        pending.push(field.ty.base_name().to_string());
        for constraint in &field.constraints {
            if let Constraint::References { entity, .. } = constraint {
                pending.push(entity.clone());
            }
        }
    }

    pub fn includes_operation(&self, name: &str) -> bool {
        self.operations.contains(name)
    }

    pub fn includes_entity(&self, name: &str) -> bool {
        self.entities.contains(name)
    }

    pub fn includes_enum(&self, name: &str) -> bool {
        self.enums.contains(name)
    }

    pub fn includes_custom_type(&self, name: &str) -> bool {
        self.custom_types.contains(name)
    }

    pub fn includes_rule(&self, name: &str) -> bool {
        self.rules.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SpecParser;

    const DOC: &str = "# Schema\nEntity: Order\n  id: UUID\n  customerId: UUID (references:Customer.id)\n  status: Status\n  code: Code\n\nEntity: Customer\n  id: UUID\n\nEntity: Unrelated\n  id: UUID\n\nStatus Enum:\n  OPEN\n\nType: Code\n  Base: String\n\n# Rules\nRule: MustBeOpen\n  When: order.status != Status.OPEN\n  Then: reject\n  Applies To: GetOrder\n\n# Operations\nOperation: GetOrder\n  Endpoint: GET /orders/{id}\n  Success: 200 Order\n\nOperation: Ping\n  Endpoint: GET /ping\n";

    #[test]
    fn test_operation_pulls_in_dependencies() {
        let doc = SpecParser::parse(DOC).unwrap();
        let scope = ScopeSelection::resolve(&doc, &["GetOrder"]).unwrap();
        assert!(scope.includes_operation("GetOrder"));
        assert!(!scope.includes_operation("Ping"));
        assert!(scope.includes_entity("Order"));
        assert!(scope.includes_entity("Customer"));
        assert!(!scope.includes_entity("Unrelated"));
        assert!(scope.includes_enum("Status"));
        assert!(scope.includes_custom_type("Code"));
        assert!(scope.includes_rule("MustBeOpen"));
    }

    #[test]
    fn test_entity_selection_does_not_pull_operations() {
        let doc = SpecParser::parse(DOC).unwrap();
        let scope = ScopeSelection::resolve(&doc, &["Customer"]).unwrap();
        assert_eq!(scope.entities.len(), 1);
        assert!(scope.operations.is_empty());
    }

    #[test]
    fn test_unknown_scope_element() {
        let doc = SpecParser::parse(DOC).unwrap();
        let err = ScopeSelection::resolve(&doc, &["Nope"]).unwrap_err();
        assert!(matches!(err, SpecError::UnknownScopeElement(_)));
    }
}
