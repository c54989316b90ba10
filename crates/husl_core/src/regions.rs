//! Protected region extraction.
//!
//! A single pass over the artifact text tracks at most one open region.
//! Nesting is not allowed, so a start marker inside an open region is an
//! error for that artifact. Every malformed marker is reported, not only
//! the first one.

use serde::Serialize;
use thiserror::Error;

use husl_spec::HookType;
use husl_templates::{MarkerLine, MarkerSyntax};

/// A custom region captured from an existing artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedRegion {
    pub name: String,
    /// Artifact the region was extracted from
    pub path: String,
    /// 1-based line of the start marker
    pub start_line: usize,
    /// 1-based line of the end marker
    pub end_line: usize,
    /// Byte offset of the first content byte
    pub content_start: usize,
    /// Byte offset one past the last content byte
    pub content_end: usize,
    /// Lines between the markers, verbatim
    pub content: String,
    pub hook: Option<HookType>,
    pub fingerprint: Option<String>,
}

/// Malformed markers found in one artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RegionExtractionError {
    #[error("line {line}: region '{name}' is never closed")]
    Unterminated { name: String, line: usize },

    #[error("line {line}: region '{inner}' starts inside region '{outer}'")]
    Nested {
        outer: String,
        inner: String,
        line: usize,
    },

    #[error("line {line}: end marker for '{name}' has no matching start")]
    UnmatchedEnd { name: String, line: usize },

    #[error("line {line}: end marker for '{found}' while region '{expected}' is open")]
    MismatchedEnd {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("line {line}: marker without a region name")]
    Malformed { line: usize },
}

impl RegionExtractionError {
    /// Region the error is about, if any.
    pub fn region(&self) -> Option<&str> {
        match self {
            RegionExtractionError::Unterminated { name, .. }
            | RegionExtractionError::UnmatchedEnd { name, .. } => Some(name),
            RegionExtractionError::Nested { inner, .. } => Some(inner),
            RegionExtractionError::MismatchedEnd { expected, .. } => Some(expected),
            RegionExtractionError::Malformed { .. } => None,
        }
    }
}

/// The region currently open during a scan.
struct OpenRegion {
    name: String,
    line: usize,
    content_start: usize,
    hook: Option<HookType>,
    fingerprint: Option<String>,
}

/// Scans artifacts for custom regions using the configured marker tokens.
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    markers: MarkerSyntax,
}

impl RegionExtractor {
    pub fn new(markers: MarkerSyntax) -> Self {
        Self { markers }
    }

    /// Check whether the text contains any marker line.
    pub fn has_markers(&self, text: &str) -> bool {
        text.lines().any(|line| self.markers.parse_line(line).is_some())
    }

    /// Extract regions in document order. Duplicate names are returned as
    /// found; deciding what they mean is up to the merge.
    pub fn extract(
        &self,
        path: &str,
        text: &str,
    ) -> Result<Vec<ProtectedRegion>, Vec<RegionExtractionError>> {
        let mut regions = Vec::new();
        let mut errors = Vec::new();
        let mut open: Option<OpenRegion> = None;
        let mut offset = 0;

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let line_no = index + 1;
            let line_start = offset;
            offset += line.len();

            let Some(marker) = self.markers.parse_line(line.trim_end_matches(['\n', '\r'])) else {
                continue;
            };

            match marker {
                MarkerLine::Malformed => errors.push(RegionExtractionError::Malformed { line: line_no }),
                MarkerLine::Start {
                    name,
                    hook,
                    fingerprint,
                } => {
                    if let Some(outer) = &open {
                        errors.push(RegionExtractionError::Nested {
                            outer: outer.name.clone(),
                            inner: name,
                            line: line_no,
                        });
                        continue;
                    }
                    open = Some(OpenRegion {
                        name,
                        line: line_no,
                        content_start: offset,
                        hook,
                        fingerprint,
                    });
                }
                MarkerLine::End { name } => match open.take() {
                    None => errors.push(RegionExtractionError::UnmatchedEnd { name, line: line_no }),
                    Some(current) if current.name != name => {
                        errors.push(RegionExtractionError::MismatchedEnd {
                            expected: current.name.clone(),
                            found: name,
                            line: line_no,
                        });
                        open = Some(current);
                    }
                    Some(current) => regions.push(ProtectedRegion {
                        content: text[current.content_start..line_start].to_string(),
                        name: current.name,
                        path: path.to_string(),
                        start_line: current.line,
                        end_line: line_no,
                        content_start: current.content_start,
                        content_end: line_start,
                        hook: current.hook,
                        fingerprint: current.fingerprint,
                    }),
                },
            }
        }

        if let Some(current) = open {
            errors.push(RegionExtractionError::Unterminated {
                name: current.name,
                line: current.line,
            });
        }

        if errors.is_empty() {
            Ok(regions)
        } else {
            Err(errors)
        }
    }
}
