//! # husl_templates
//!
//! Stack configuration and target projection for husl.
//!
//! A stack configuration describes one target language: where each kind of
//! artifact goes, the body templates, the type map, the generated-file header
//! and the custom region markers. The projector combines it with a validated
//! document to produce artifacts keyed by path.
//!
//! ## Features
//!
//! - **Configuration**: YAML or TOML, every key optional
//! - **Templates**: `{{var}}` placeholders with indented block lines
//! - **Markers**: comment-agnostic region markers with contract fingerprints
//! - **Projection**: deterministic, selective, with region placeholders
//!
//! ## Example
//!
//! ```rust,no_run
//! use husl_spec::SpecParser;
//! use husl_templates::{Projector, StackConfigLoader};
//!
//! let doc = SpecParser::parse_file("./orders.husl.md").unwrap();
//! let config = StackConfigLoader::load("./husl.stack.yaml").unwrap();
//!
//! let projection = Projector::new(config).project(&doc, None).unwrap();
//! for artifact in projection.iter() {
//!     println!("{} ({} regions)", artifact.path, artifact.placeholders.len());
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod markers;
pub mod projector;
pub mod renderer;

pub use config::{ArtifactKind, BodyTemplates, MarkerTokens, PathTemplates, StackConfig};
pub use error::{TemplateError, TemplateResult};
pub use loader::StackConfigLoader;
pub use markers::{contract_fingerprint, MarkerLine, MarkerSyntax, FINGERPRINT_LEN};
pub use projector::{strip_header, Artifact, Projection, Projector, RegionPlaceholder};
pub use renderer::{TemplateRenderer, TemplateVars};
