//! Check-only planning.
//!
//! Runs extraction and merge for every projected artifact without writing
//! anything and classifies the result per path. Bodies are compared with the
//! header removed so a new timestamp alone never counts as a change.
//!
//! An artifact whose element was renamed is merged with the regions of the
//! file generated under the old name, so custom code moves with it.

use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, info};

use husl_templates::{strip_header, Artifact, Projection, Projector};

use crate::merge::{ConflictKind, MergeConflict, MergeEngine};
use crate::regions::RegionExtractor;
use crate::renames::RenameMap;
use crate::tree::ArtifactTree;

/// Planned outcome of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeStatus {
    Unchanged,
    WouldCreate,
    WouldModify,
    WouldConflict,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Unchanged => "unchanged",
            ChangeStatus::WouldCreate => "would-create",
            ChangeStatus::WouldModify => "would-modify",
            ChangeStatus::WouldConflict => "would-conflict",
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One artifact in a change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub path: String,
    pub status: ChangeStatus,
    /// Unified diff of the artifact body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<MergeConflict>,
    /// Path the artifact was generated at before its element was renamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    /// Merged content to write, absent for conflicts
    #[serde(skip)]
    pub content: Option<String>,
}

impl ChangeEntry {
    fn conflicted(path: &str, renamed_from: Option<String>, conflicts: Vec<MergeConflict>) -> Self {
        Self {
            path: path.to_string(),
            status: ChangeStatus::WouldConflict,
            delta: None,
            conflicts,
            renamed_from,
            content: None,
        }
    }
}

/// Per-artifact plan for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub entries: Vec<ChangeEntry>,
    /// Tree files that look generated but are no longer projected
    pub stale: Vec<String>,
}

impl ChangeSet {
    pub fn entry(&self, path: &str) -> Option<&ChangeEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn count(&self, status: ChangeStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn has_conflicts(&self) -> bool {
        self.count(ChangeStatus::WouldConflict) > 0
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &MergeConflict> {
        self.entries.iter().flat_map(|e| e.conflicts.iter())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Unified diff between two artifact bodies.
pub fn unified_delta(path: &str, old: &str, new: &str) -> String {
    delta_between(path, path, old, new)
}

fn delta_between(old_path: &str, new_path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", old_path), &format!("b/{}", new_path))
        .to_string()
}

/// Plans a projection against an artifact tree.
pub struct Planner<'a> {
    projector: &'a Projector,
    renames: Option<&'a RenameMap>,
    extractor: RegionExtractor,
    merger: MergeEngine,
}

impl<'a> Planner<'a> {
    pub fn new(projector: &'a Projector) -> Self {
        let markers = projector.markers().clone();
        Self {
            projector,
            renames: None,
            extractor: RegionExtractor::new(markers.clone()),
            merger: MergeEngine::new(markers),
        }
    }

    /// Look for artifacts of renamed elements under their earlier paths.
    pub fn with_renames(mut self, renames: &'a RenameMap) -> Self {
        self.renames = Some(renames);
        self
    }

    /// Classify every projected artifact. Stale files are only looked for
    /// when `full_scope` is set.
    pub fn plan(&self, projection: &Projection, tree: &ArtifactTree, full_scope: bool) -> ChangeSet {
        let entries: Vec<ChangeEntry> = projection
            .iter()
            .map(|artifact| self.plan_artifact(artifact, projection, tree))
            .collect();

        let stale = if full_scope {
            self.stale(projection, tree)
        } else {
            Vec::new()
        };

        let changes = ChangeSet { entries, stale };
        info!(
            "Planned {} artifacts: {} create, {} modify, {} unchanged, {} conflict",
            changes.entries.len(),
            changes.count(ChangeStatus::WouldCreate),
            changes.count(ChangeStatus::WouldModify),
            changes.count(ChangeStatus::Unchanged),
            changes.count(ChangeStatus::WouldConflict)
        );
        changes
    }

    fn plan_artifact(&self, artifact: &Artifact, projection: &Projection, tree: &ArtifactTree) -> ChangeEntry {
        let path = artifact.path.as_str();
        let header_lines = projection.header_lines;
        if tree.is_unreadable(path) {
            debug!("{} exists but is not text", path);
            let conflict = MergeConflict::artifact(
                ConflictKind::UnreadableArtifact,
                path,
                "existing file is not valid UTF-8 and would be overwritten",
            );
            return ChangeEntry::conflicted(path, None, vec![conflict]);
        }

        let (source, existing) = match tree.get(path) {
            Some(existing) => (path, existing),
            None => match self.previous_artifact(artifact, projection, tree) {
                Ok(Some(previous)) => previous,
                Ok(None) => {
                    debug!("{} does not exist yet", path);
                    return ChangeEntry {
                        path: path.to_string(),
                        status: ChangeStatus::WouldCreate,
                        delta: Some(unified_delta(path, "", strip_header(&artifact.content, header_lines))),
                        conflicts: Vec::new(),
                        renamed_from: None,
                        content: Some(artifact.content.clone()),
                    };
                }
                Err(conflict) => return ChangeEntry::conflicted(path, None, vec![conflict]),
            },
        };
        let renamed_from = (source != path).then(|| source.to_string());

        let merged = self
            .extractor
            .extract(source, existing)
            .map_err(|errors| {
                errors
                    .iter()
                    .map(|e| MergeConflict::from_extraction(source, e))
                    .collect::<Vec<_>>()
            })
            .and_then(|prior| self.merger.merge(artifact, &prior));

        let merged = match merged {
            Ok(merged) => merged,
            Err(conflicts) => {
                debug!("{} has {} conflict(s)", path, conflicts.len());
                return ChangeEntry::conflicted(path, renamed_from, conflicts);
            }
        };

        let old_body = strip_header(existing, header_lines);
        let new_body = strip_header(&merged.content, header_lines);
        if renamed_from.is_none() && old_body == new_body {
            return ChangeEntry {
                path: path.to_string(),
                status: ChangeStatus::Unchanged,
                delta: None,
                conflicts: Vec::new(),
                renamed_from: None,
                content: None,
            };
        }

        ChangeEntry {
            path: path.to_string(),
            status: if renamed_from.is_some() {
                ChangeStatus::WouldCreate
            } else {
                ChangeStatus::WouldModify
            },
            delta: Some(delta_between(source, path, old_body, new_body)),
            conflicts: Vec::new(),
            renamed_from,
            content: Some(merged.content),
        }
    }

    /// The file a renamed artifact was generated into before. Each element
    /// of the artifact contributes the most recent earlier path that still
    /// exists; more than one such file is a conflict.
    fn previous_artifact<'t>(
        &self,
        artifact: &Artifact,
        projection: &Projection,
        tree: &'t ArtifactTree,
    ) -> Result<Option<(&'t str, &'t str)>, MergeConflict> {
        let Some(renames) = self.renames else {
            return Ok(None);
        };

        let mut candidates: Vec<String> = Vec::new();
        for kind in &artifact.kinds {
            for source in &artifact.sources {
                let found = renames
                    .previous_names(*kind, source)
                    .into_iter()
                    .filter_map(|old| self.projector.path_for(*kind, &old).ok().flatten())
                    .find(|old_path| {
                        old_path != &artifact.path
                            && projection.get(old_path).is_none()
                            && tree.contains(old_path)
                    });
                if let Some(old_path) = found {
                    if !candidates.contains(&old_path) {
                        candidates.push(old_path);
                    }
                }
            }
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [old_path] => {
                debug!("{} was generated as {}", artifact.path, old_path);
                Ok(tree.get_entry(old_path))
            }
            _ => Err(MergeConflict::artifact(
                ConflictKind::AmbiguousRename,
                &artifact.path,
                format!("previously generated as {}", candidates.join(", ")),
            )),
        }
    }

    fn stale(&self, projection: &Projection, tree: &ArtifactTree) -> Vec<String> {
        tree.paths()
            .filter(|path| projection.get(path).is_none())
            .filter(|path| {
                tree.get(path).map_or(false, |content| {
                    self.projector.is_generated(content) || self.extractor.has_markers(content)
                })
            })
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use husl_spec::{RefactorApplier, RefactoringMetadata, SpecParser};
    use husl_templates::StackConfig;

    const WIDGETS: &str = "# Schema\nEntity: Widget\n  id: UUID (required)\n  Custom: pricing (extend)\n\n# Operations\nOperation: GetWidget\n  Endpoint: GET /widgets/{id}\n  Success: 200 Widget\n";

    fn projector(timestamp: &str) -> Projector {
        Projector::new(StackConfig::default()).with_timestamp(timestamp)
    }

    #[test]
    fn test_empty_tree_creates_everything() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let projection = projector.project(&doc, None).unwrap();
        let changes = Planner::new(&projector).plan(&projection, &ArtifactTree::empty("out"), true);

        assert_eq!(changes.count(ChangeStatus::WouldCreate), 2);
        let model = changes.entry("src/models/widget.ts").unwrap();
        assert!(model.delta.as_deref().unwrap().starts_with("--- a/src/models/widget.ts\n+++ b/src/models/widget.ts\n"));
        assert!(changes.stale.is_empty());
    }

    #[test]
    fn test_header_only_change_is_unchanged() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let earlier = projector("2026-01-01T00:00:00Z").project(&doc, None).unwrap();
        let tree = ArtifactTree::from_files(
            "out",
            earlier.iter().map(|a| (a.path.clone(), a.content.clone())),
        );

        let later = projector("2027-01-01T00:00:00Z");
        let projection = later.project(&doc, None).unwrap();
        let changes = Planner::new(&later).plan(&projection, &tree, true);
        assert_eq!(changes.count(ChangeStatus::Unchanged), 2);
        assert!(changes.entries.iter().all(|e| e.content.is_none()));
    }

    #[test]
    fn test_body_change_is_modify_with_delta() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let projection = projector.project(&doc, None).unwrap();
        let model = projection.get("src/models/widget.ts").unwrap();
        let tree = ArtifactTree::from_files(
            "out",
            [(model.path.clone(), model.content.replace("id: string;", "id: number;"))],
        );

        let changes = Planner::new(&projector).plan(&projection, &tree, true);
        let entry = changes.entry("src/models/widget.ts").unwrap();
        assert_eq!(entry.status, ChangeStatus::WouldModify);
        let delta = entry.delta.as_deref().unwrap();
        assert!(delta.contains("-  id: number;\n"));
        assert!(delta.contains("+  id: string;\n"));
    }

    #[test]
    fn test_malformed_markers_conflict() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let projection = projector.project(&doc, None).unwrap();
        let tree = ArtifactTree::from_files(
            "out",
            [("src/models/widget.ts", "// HUSL-CUSTOM-BEGIN pricing hook=extend contract=00\n")],
        );

        let changes = Planner::new(&projector).plan(&projection, &tree, true);
        let entry = changes.entry("src/models/widget.ts").unwrap();
        assert_eq!(entry.status, ChangeStatus::WouldConflict);
        assert_eq!(entry.conflicts[0].kind, crate::merge::ConflictKind::MalformedMarker);
        assert!(changes.has_conflicts());
    }

    #[test]
    fn test_unreadable_file_is_never_overwritten() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let projection = projector.project(&doc, None).unwrap();
        let tree = ArtifactTree::empty("out").with_unreadable("src/models/widget.ts");

        let changes = Planner::new(&projector).plan(&projection, &tree, true);
        let entry = changes.entry("src/models/widget.ts").unwrap();
        assert_eq!(entry.status, ChangeStatus::WouldConflict);
        assert_eq!(entry.conflicts[0].kind, ConflictKind::UnreadableArtifact);
        assert!(entry.content.is_none());
        assert_eq!(changes.count(ChangeStatus::WouldCreate), 1);
    }

    #[test]
    fn test_renamed_entity_carries_regions() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let before = projector.project(&doc, None).unwrap();
        let model = before.get("src/models/widget.ts").unwrap();
        let custom = model
            .content
            .replacen("// HUSL-CUSTOM-END pricing", "const discount = 0.1;\n  // HUSL-CUSTOM-END pricing", 1);
        assert_ne!(custom, model.content);
        let tree = ArtifactTree::from_files("out", [(model.path.clone(), custom)]);

        let metadata = RefactoringMetadata::from_yaml("renames:\n  entities: {Widget: Gadget}\n").unwrap();
        let renamed = RefactorApplier::apply(&doc, &metadata).unwrap();
        let projection = projector.project(&renamed, None).unwrap();

        // Without the renames the new model starts from scratch.
        let changes = Planner::new(&projector).plan(&projection, &tree, true);
        let entry = changes.entry("src/models/gadget.ts").unwrap();
        assert!(entry.renamed_from.is_none());
        assert!(!entry.content.as_deref().unwrap().contains("const discount = 0.1;"));

        let renames = RenameMap::from_metadata(&metadata);
        let changes = Planner::new(&projector).with_renames(&renames).plan(&projection, &tree, true);
        let entry = changes.entry("src/models/gadget.ts").unwrap();
        assert_eq!(entry.status, ChangeStatus::WouldCreate);
        assert_eq!(entry.renamed_from.as_deref(), Some("src/models/widget.ts"));
        assert!(entry.content.as_deref().unwrap().contains("const discount = 0.1;"));
        assert!(entry
            .delta
            .as_deref()
            .unwrap()
            .starts_with("--- a/src/models/widget.ts\n+++ b/src/models/gadget.ts\n"));
        assert_eq!(changes.stale, vec!["src/models/widget.ts"]);
    }

    #[test]
    fn test_stale_files_full_scope_only() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projector = projector("2026-01-01T00:00:00Z");
        let projection = projector.project(&doc, None).unwrap();
        let tree = ArtifactTree::from_files(
            "out",
            [
                ("src/models/gadget.ts", "// Generated by husl at 2025-01-01T00:00:00Z.\n// Edit only inside custom regions.\n"),
                ("src/legacy.ts", "// HUSL-CUSTOM-BEGIN x hook=after contract=00\n// HUSL-CUSTOM-END x\n"),
                ("README.md", "# hand written\n"),
            ],
        );

        let planner = Planner::new(&projector);
        assert_eq!(
            planner.plan(&projection, &tree, true).stale,
            vec!["src/legacy.ts", "src/models/gadget.ts"]
        );
        assert!(planner.plan(&projection, &tree, false).stale.is_empty());
    }

    #[test]
    fn test_change_set_json_shape() {
        let changes = ChangeSet {
            entries: vec![ChangeEntry {
                path: "a.ts".into(),
                status: ChangeStatus::Unchanged,
                delta: None,
                conflicts: Vec::new(),
                renamed_from: None,
                content: Some("ignored".into()),
            }],
            stale: Vec::new(),
        };
        let value: serde_json::Value = serde_json::from_str(&changes.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"entries": [{"path": "a.ts", "status": "unchanged"}], "stale": []})
        );
    }
}
