//! # husl_core
//!
//! Regeneration engine for husl.
//!
//! Captures custom regions from existing artifacts, merges them into fresh
//! projections and plans or applies the result against an output directory.
//! Hand-written code inside custom regions survives every regeneration, and
//! any change that would silently lose it is reported as a conflict instead.
//!
//! ## Features
//!
//! - **Region extraction**: all malformed markers of an artifact in one pass
//! - **Merge**: contract fingerprints, orphaned and duplicate region detection
//! - **Planning**: per-artifact status with unified diffs, JSON serializable
//! - **Generation**: atomic writes, cooperative cancellation
//! - **Renames**: regions follow artifacts whose element was renamed
//!
//! ## Example
//!
//! ```rust,no_run
//! use husl_core::{ArtifactTree, Cancellation, RegenEngine};
//! use husl_templates::StackConfig;
//!
//! let text = std::fs::read_to_string("./orders.husl.md").unwrap();
//! let tree = ArtifactTree::load("./generated").unwrap();
//! let engine = RegenEngine::new();
//!
//! let changes = engine.plan(&text, &tree, &StackConfig::default(), None).unwrap();
//! println!("{}", changes.to_json().unwrap());
//!
//! let report = engine
//!     .generate(&text, &tree, &StackConfig::default(), None, &Cancellation::new())
//!     .unwrap();
//! println!("{} artifacts", report.artifacts.len());
//! ```

pub mod engine;
pub mod error;
pub mod lock;
pub mod merge;
pub mod planner;
pub mod regions;
pub mod renames;
pub mod tree;

pub use engine::{ArtifactOutcome, ArtifactReport, Cancellation, RegenEngine, RunReport};
pub use error::{CoreError, CoreResult, EngineError, EngineResult};
pub use lock::OutputLock;
pub use merge::{ConflictKind, MergeConflict, MergeEngine, MergedArtifact};
pub use planner::{unified_delta, ChangeEntry, ChangeSet, ChangeStatus, Planner};
pub use regions::{ProtectedRegion, RegionExtractionError, RegionExtractor};
pub use renames::RenameMap;
pub use tree::ArtifactTree;
