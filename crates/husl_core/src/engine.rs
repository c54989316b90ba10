//! Regeneration engine facade.
//!
//! Parser, validator and projector run once per call; extraction and merge
//! run per artifact. Parse or validation failures abort before any write.
//! Per-artifact conflicts and write failures only affect that artifact and
//! are collected into the run report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use husl_spec::{
    RefactorApplier, RefactoringMetadata, ScopeSelection, SpecDocument, SpecParser,
    SpecValidator, ValidationIssue, ValidationReport,
};
use husl_templates::{Projector, StackConfig};

use crate::error::{EngineError, EngineResult};
use crate::merge::MergeConflict;
use crate::planner::{ChangeEntry, ChangeSet, ChangeStatus, Planner};
use crate::renames::RenameMap;
use crate::tree::ArtifactTree;

/// Cooperative cancellation flag checked between artifacts.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one artifact during `generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactOutcome {
    Written,
    Unchanged,
    SkippedConflict,
    Failed,
    Cancelled,
}

impl ArtifactOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactOutcome::Written => "written",
            ArtifactOutcome::Unchanged => "unchanged",
            ArtifactOutcome::SkippedConflict => "skipped-conflict",
            ArtifactOutcome::Failed => "failed",
            ArtifactOutcome::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ArtifactOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    pub path: String,
    pub outcome: ArtifactOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<MergeConflict>,
    /// Earlier path whose regions were carried into this artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArtifactReport {
    fn new(path: String, outcome: ArtifactOutcome) -> Self {
        Self {
            path,
            outcome,
            conflicts: Vec::new(),
            renamed_from: None,
            error: None,
        }
    }
}

/// Outcome of every artifact in a `generate` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub artifacts: Vec<ArtifactReport>,
    /// Validation warnings of the generated document
    pub warnings: Vec<ValidationIssue>,
    pub stale: Vec<String>,
}

impl RunReport {
    pub fn artifact(&self, path: &str) -> Option<&ArtifactReport> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    pub fn count(&self, outcome: ArtifactOutcome) -> usize {
        self.artifacts.iter().filter(|a| a.outcome == outcome).count()
    }

    pub fn has_conflicts(&self) -> bool {
        self.count(ArtifactOutcome::SkippedConflict) > 0
    }

    pub fn has_failures(&self) -> bool {
        self.count(ArtifactOutcome::Failed) > 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.count(ArtifactOutcome::Cancelled) > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Entry point for validate, plan, generate and refactor.
#[derive(Debug, Clone, Default)]
pub struct RegenEngine {
    generated_at: Option<String>,
    /// Renames on top of those in the document's version history
    renames: RenameMap,
}

impl RegenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp headers with a fixed timestamp instead of the current time.
    pub fn with_timestamp(mut self, generated_at: impl Into<String>) -> Self {
        self.generated_at = Some(generated_at.into());
        self
    }

    /// Carry regions of artifacts generated before these renames.
    pub fn with_renames(mut self, renames: RenameMap) -> Self {
        self.renames.extend(renames);
        self
    }

    /// Parse and validate. Validation errors are returned in the report,
    /// only parse failures are an `Err`.
    pub fn validate(&self, text: &str) -> EngineResult<ValidationReport> {
        let doc = SpecParser::parse(text)?;
        let report = SpecValidator::validate(&doc);
        info!(
            "Validated document: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
        Ok(report)
    }

    /// Compute the change set without writing anything.
    pub fn plan(
        &self,
        text: &str,
        tree: &ArtifactTree,
        config: &StackConfig,
        scope: Option<&[String]>,
    ) -> EngineResult<ChangeSet> {
        let (doc, _) = self.load(text)?;
        self.plan_document(&doc, tree, config, scope)
    }

    /// Write every artifact that is not in conflict. Conflicting artifacts
    /// are left untouched on disk.
    pub fn generate(
        &self,
        text: &str,
        tree: &ArtifactTree,
        config: &StackConfig,
        scope: Option<&[String]>,
        cancel: &Cancellation,
    ) -> EngineResult<RunReport> {
        let (doc, report) = self.load(text)?;
        let changes = self.plan_document(&doc, tree, config, scope)?;

        let mut run = RunReport {
            artifacts: Vec::with_capacity(changes.entries.len()),
            warnings: report.warnings().cloned().collect(),
            stale: changes.stale,
        };

        for entry in changes.entries {
            let ChangeEntry {
                path,
                status,
                conflicts,
                renamed_from,
                content,
                ..
            } = entry;
            if cancel.is_cancelled() {
                run.artifacts
                    .push(ArtifactReport::new(path, ArtifactOutcome::Cancelled));
                continue;
            }

            let artifact = match (status, content) {
                (ChangeStatus::WouldConflict, _) => {
                    warn!("Skipping {}: {} conflict(s)", path, conflicts.len());
                    ArtifactReport {
                        conflicts,
                        renamed_from,
                        ..ArtifactReport::new(path, ArtifactOutcome::SkippedConflict)
                    }
                }
                (ChangeStatus::Unchanged, _) | (_, None) => {
                    ArtifactReport::new(path, ArtifactOutcome::Unchanged)
                }
                (_, Some(content)) => match tree.write_atomic(&path, &content) {
                    Ok(_) => {
                        debug!("Wrote {}", path);
                        ArtifactReport {
                            renamed_from,
                            ..ArtifactReport::new(path, ArtifactOutcome::Written)
                        }
                    }
                    Err(e) => {
                        error!("Failed to write {}: {}", path, e);
                        ArtifactReport {
                            error: Some(e.to_string()),
                            ..ArtifactReport::new(path, ArtifactOutcome::Failed)
                        }
                    }
                },
            };
            run.artifacts.push(artifact);
        }

        info!(
            "Generation finished: {} written, {} unchanged, {} conflict, {} failed, {} cancelled",
            run.count(ArtifactOutcome::Written),
            run.count(ArtifactOutcome::Unchanged),
            run.count(ArtifactOutcome::SkippedConflict),
            run.count(ArtifactOutcome::Failed),
            run.count(ArtifactOutcome::Cancelled)
        );
        Ok(run)
    }

    /// Apply refactoring metadata to the document.
    pub fn refactor(&self, text: &str, metadata: &RefactoringMetadata) -> EngineResult<SpecDocument> {
        let doc = SpecParser::parse(text)?;
        Ok(RefactorApplier::apply(&doc, metadata)?)
    }

    /// Apply the refactoring metadata attached to a version history entry.
    pub fn refactor_to_version(&self, text: &str, version: &str) -> EngineResult<SpecDocument> {
        let doc = SpecParser::parse(text)?;
        Ok(RefactorApplier::apply_version(&doc, version)?)
    }

    fn projector(&self, config: &StackConfig) -> EngineResult<Projector> {
        config.validate()?;
        let projector = Projector::new(config.clone());
        Ok(match &self.generated_at {
            Some(generated_at) => projector.with_timestamp(generated_at.clone()),
            None => projector,
        })
    }

    /// Parse and validate, failing on any validation error.
    fn load(&self, text: &str) -> EngineResult<(SpecDocument, ValidationReport)> {
        let doc = SpecParser::parse(text)?;
        let report = SpecValidator::validate(&doc);
        if !report.valid {
            return Err(EngineError::Validation(report));
        }
        for warning in report.warnings() {
            warn!("{}", warning);
        }
        Ok((doc, report))
    }

    fn plan_document(
        &self,
        doc: &SpecDocument,
        tree: &ArtifactTree,
        config: &StackConfig,
        scope: Option<&[String]>,
    ) -> EngineResult<ChangeSet> {
        let projector = self.projector(config)?;
        let selection = match scope {
            Some(names) => Some(ScopeSelection::resolve(doc, names)?),
            None => None,
        };
        let projection = projector.project(doc, selection.as_ref())?;

        let mut renames = RenameMap::from_history(doc);
        renames.extend(self.renames.clone());
        Ok(Planner::new(&projector)
            .with_renames(&renames)
            .plan(&projection, tree, selection.is_none()))
    }
}
