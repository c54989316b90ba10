//! Merging preserved regions into freshly projected artifacts.
//!
//! Regions are matched by name only. A captured region is substituted into
//! the fresh artifact when its stored fingerprint still matches the
//! placeholder's contract. Anything else is a conflict, and an artifact with
//! a conflict is never merged.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use husl_spec::HookType;
use husl_templates::{Artifact, MarkerSyntax};

use crate::regions::{ProtectedRegion, RegionExtractionError, RegionExtractor};

/// Conflict classes. None of them is ever resolved automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// The placeholder's hook or contract changed since the region was written
    SignatureMismatch,
    /// The region's custom implementation entry no longer exists
    OrphanedRegion,
    /// Two captured regions in one artifact share a name
    DuplicateRegion,
    /// A `replace` region's placeholder is no longer `replace`
    HookTypeDrift,
    /// The existing artifact has malformed or nested markers
    MalformedMarker,
    /// A file exists at the artifact path but is not text
    UnreadableArtifact,
    /// A renamed artifact has more than one previously generated file
    AmbiguousRename,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::SignatureMismatch => "signature-mismatch",
            ConflictKind::OrphanedRegion => "orphaned-region",
            ConflictKind::DuplicateRegion => "duplicate-region",
            ConflictKind::HookTypeDrift => "hook-type-drift",
            ConflictKind::MalformedMarker => "malformed-marker",
            ConflictKind::UnreadableArtifact => "unreadable-artifact",
            ConflictKind::AmbiguousRename => "ambiguous-rename",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One conflict in one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub kind: ConflictKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub message: String,
}

impl MergeConflict {
    fn region(kind: ConflictKind, path: &str, region: &str, message: String) -> Self {
        Self {
            kind,
            path: path.to_string(),
            region: Some(region.to_string()),
            message,
        }
    }

    /// A conflict of the artifact as a whole.
    pub fn artifact(kind: ConflictKind, path: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.to_string(),
            region: None,
            message: message.into(),
        }
    }

    /// Report a malformed marker as a conflict of its artifact.
    pub fn from_extraction(path: &str, error: &RegionExtractionError) -> Self {
        Self {
            kind: ConflictKind::MalformedMarker,
            path: path.to_string(),
            region: error.region().map(str::to_string),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "[{}] {} ({}): {}", self.kind, self.path, region, self.message),
            None => write!(f, "[{}] {}: {}", self.kind, self.path, self.message),
        }
    }
}

/// A merged artifact ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    pub content: String,
    /// Regions whose captured content was carried over
    pub preserved: Vec<String>,
}

/// Reconciles fresh projections with captured regions.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    extractor: RegionExtractor,
}

fn hook_label(hook: Option<HookType>) -> &'static str {
    hook.map(|h| h.as_str()).unwrap_or("unknown")
}

impl MergeEngine {
    pub fn new(markers: MarkerSyntax) -> Self {
        Self {
            extractor: RegionExtractor::new(markers),
        }
    }

    /// Check every captured region against the fresh placeholders.
    pub fn check(&self, artifact: &Artifact, prior: &[ProtectedRegion]) -> Vec<MergeConflict> {
        let path = artifact.path.as_str();
        let mut conflicts = Vec::new();

        let mut by_name: BTreeMap<&str, Vec<&ProtectedRegion>> = BTreeMap::new();
        for region in prior {
            by_name.entry(region.name.as_str()).or_default().push(region);
        }

        for region in prior {
            let same_name = &by_name[region.name.as_str()];
            if same_name.len() > 1 {
                // Report a duplicate once, at its first occurrence.
                if std::ptr::eq(same_name[0], region) {
                    let lines: Vec<String> = same_name.iter().map(|r| r.start_line.to_string()).collect();
                    conflicts.push(MergeConflict::region(
                        ConflictKind::DuplicateRegion,
                        path,
                        &region.name,
                        format!("region appears {} times (lines {})", same_name.len(), lines.join(", ")),
                    ));
                }
                continue;
            }

            let Some(placeholder) = artifact.placeholder(&region.name) else {
                conflicts.push(MergeConflict::region(
                    ConflictKind::OrphanedRegion,
                    path,
                    &region.name,
                    format!(
                        "region at line {} has no custom implementation entry any more",
                        region.start_line
                    ),
                ));
                continue;
            };

            if region.hook == Some(HookType::Replace) && placeholder.hook != HookType::Replace {
                conflicts.push(MergeConflict::region(
                    ConflictKind::HookTypeDrift,
                    path,
                    &region.name,
                    format!("hook changed from replace to {}", placeholder.hook),
                ));
            } else if region.fingerprint.as_deref() != Some(placeholder.fingerprint.as_str()) {
                let message = if region.hook != Some(placeholder.hook) {
                    format!(
                        "hook changed from {} to {}",
                        hook_label(region.hook),
                        placeholder.hook
                    )
                } else {
                    format!(
                        "contract changed to '{}'",
                        placeholder.contract.as_deref().unwrap_or("")
                    )
                };
                conflicts.push(MergeConflict::region(
                    ConflictKind::SignatureMismatch,
                    path,
                    &region.name,
                    message,
                ));
            }
        }

        conflicts
    }

    /// Merge captured regions into the fresh artifact. Without prior regions
    /// this is the fresh content unchanged.
    pub fn merge(
        &self,
        artifact: &Artifact,
        prior: &[ProtectedRegion],
    ) -> Result<MergedArtifact, Vec<MergeConflict>> {
        let conflicts = self.check(artifact, prior);
        if !conflicts.is_empty() {
            return Err(conflicts);
        }
        if prior.is_empty() {
            return Ok(MergedArtifact {
                content: artifact.content.clone(),
                preserved: Vec::new(),
            });
        }

        let captured: HashMap<&str, &str> = prior
            .iter()
            .map(|r| (r.name.as_str(), r.content.as_str()))
            .collect();

        let fresh = self
            .extractor
            .extract(&artifact.path, &artifact.content)
            .map_err(|errors| {
                errors
                    .iter()
                    .map(|e| MergeConflict::from_extraction(&artifact.path, e))
                    .collect::<Vec<_>>()
            })?;

        let mut content = String::with_capacity(artifact.content.len());
        let mut preserved = Vec::new();
        let mut cursor = 0;
        for region in &fresh {
            if let Some(body) = captured.get(region.name.as_str()) {
                content.push_str(&artifact.content[cursor..region.content_start]);
                content.push_str(body);
                cursor = region.content_end;
                preserved.push(region.name.clone());
            }
        }
        content.push_str(&artifact.content[cursor..]);

        debug!(
            "Merged {} with {} preserved region(s)",
            artifact.path,
            preserved.len()
        );
        Ok(MergedArtifact { content, preserved })
    }
}
