//! Element renames used to find previously generated artifacts.
//!
//! A rename moves an artifact whenever the element name is part of its path.
//! The planner asks this map for the earlier names of a projected element so
//! captured regions can follow the artifact to its new path.

use std::collections::BTreeMap;

use husl_spec::{RefactoringMetadata, Renames, SpecDocument};
use husl_templates::ArtifactKind;

/// One refactoring's old → new element names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RenameStep {
    types: BTreeMap<String, String>,
    operations: BTreeMap<String, String>,
}

impl RenameStep {
    fn from_renames(renames: &Renames) -> Self {
        let mut types = renames.entities.clone();
        types.extend(renames.enums.clone());
        types.extend(renames.custom_types.clone());
        Self {
            types,
            operations: renames.operations.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.types.is_empty() && self.operations.is_empty()
    }

    fn table(&self, kind: ArtifactKind) -> &BTreeMap<String, String> {
        match kind {
            ArtifactKind::Model | ArtifactKind::Enum | ArtifactKind::CustomType => &self.types,
            ArtifactKind::Service | ArtifactKind::Endpoint | ArtifactKind::Test => &self.operations,
        }
    }

    /// The name `name` had before this step.
    fn before<'a>(&'a self, kind: ArtifactKind, name: &'a str) -> &'a str {
        self.table(kind)
            .iter()
            .find(|(_, new)| new.as_str() == name)
            .map(|(old, _)| old.as_str())
            .unwrap_or(name)
    }
}

/// Ordered element renames, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    steps: Vec<RenameStep>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames of one refactoring.
    pub fn from_metadata(metadata: &RefactoringMetadata) -> Self {
        let mut map = Self::new();
        map.push(metadata);
        map
    }

    /// Renames recorded in the document's version history, in entry order.
    pub fn from_history(doc: &SpecDocument) -> Self {
        let mut map = Self::new();
        for metadata in doc
            .version_history
            .entries
            .iter()
            .filter_map(|entry| entry.refactoring.as_ref())
        {
            map.push(metadata);
        }
        map
    }

    /// Append a later refactoring.
    pub fn push(&mut self, metadata: &RefactoringMetadata) {
        let step = RenameStep::from_renames(&metadata.renames);
        if !step.is_empty() {
            self.steps.push(step);
        }
    }

    /// Append every step of a later map.
    pub fn extend(&mut self, later: RenameMap) {
        self.steps.extend(later.steps);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Earlier names of an element, most recent first. Each step is applied
    /// once, so a swap inside one refactoring never chains.
    pub fn previous_names(&self, kind: ArtifactKind, name: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut current = name.to_string();
        for step in self.steps.iter().rev() {
            let before = step.before(kind, &current).to_string();
            if before != current {
                if before != name && !names.contains(&before) {
                    names.push(before.clone());
                }
                current = before;
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(yaml: &str) -> RefactoringMetadata {
        RefactoringMetadata::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_previous_names_follow_kind() {
        let map = RenameMap::from_metadata(&metadata(
            "renames:\n  operations: {PayOrder: SettleOrder}\n  entities: {Order: Purchase}\n",
        ));
        assert_eq!(map.previous_names(ArtifactKind::Service, "SettleOrder"), vec!["PayOrder"]);
        assert_eq!(map.previous_names(ArtifactKind::Model, "Purchase"), vec!["Order"]);
        assert!(map.previous_names(ArtifactKind::Model, "SettleOrder").is_empty());
        assert!(map.previous_names(ArtifactKind::Service, "PayOrder").is_empty());
    }

    #[test]
    fn test_chained_refactorings() {
        let mut map = RenameMap::from_metadata(&metadata("renames:\n  operations: {PayOrder: SettleOrder}\n"));
        map.push(&metadata("renames:\n  operations: {SettleOrder: ClearOrder}\n"));
        map.push(&metadata("additions:\n  enum_values: {Status: [{value: HELD}]}\n"));
        assert_eq!(
            map.previous_names(ArtifactKind::Endpoint, "ClearOrder"),
            vec!["SettleOrder", "PayOrder"]
        );
    }

    #[test]
    fn test_swap_does_not_chain() {
        let map = RenameMap::from_metadata(&metadata("renames:\n  entities: {A: B, B: A}\n"));
        assert_eq!(map.previous_names(ArtifactKind::Model, "A"), vec!["B"]);
        assert_eq!(map.previous_names(ArtifactKind::Model, "B"), vec!["A"]);
    }
}
