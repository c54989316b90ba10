//! Target projection.
//!
//! Maps a validated document plus a stack configuration to artifacts keyed by
//! relative path. Entities become models, enums and custom types get their
//! own artifacts, operations become a service section and an endpoint section,
//! and operations with tests get a test artifact. Rules are inlined into the
//! service of every operation they apply to.
//!
//! Output is deterministic: the only varying text is the header timestamp,
//! which lives in the first `header_lines` lines of each artifact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use husl_spec::{
    CustomImpl, CustomType, Entity, EnumDef, Field, HookType, Operation, ScopeSelection,
    SpecDocument, TestCase, TypeRef,
};

use crate::config::{ArtifactKind, StackConfig};
use crate::error::{TemplateError, TemplateResult};
use crate::markers::{contract_fingerprint, MarkerSyntax};
use crate::renderer::{TemplateRenderer, TemplateVars};

/// A custom region the projector emits, with the body it holds by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionPlaceholder {
    pub name: String,
    pub hook: HookType,
    pub contract: Option<String>,
    pub fingerprint: String,
    pub default_body: String,
}

/// One projected output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Relative path with `/` separators
    pub path: String,
    /// Kinds of the sections joined into this artifact, in projection order
    pub kinds: Vec<ArtifactKind>,
    /// Names of the elements projected into this artifact
    pub sources: Vec<String>,
    pub content: String,
    pub placeholders: Vec<RegionPlaceholder>,
}

impl Artifact {
    pub fn placeholder(&self, name: &str) -> Option<&RegionPlaceholder> {
        self.placeholders.iter().find(|p| p.name == name)
    }
}

/// The full set of projected artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub artifacts: BTreeMap<String, Artifact>,
    /// Leading lines of every artifact taken by the header
    pub header_lines: usize,
}

impl Projection {
    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(|p| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Drop the first `lines` lines of an artifact.
pub fn strip_header(content: &str, lines: usize) -> &str {
    let mut rest = content;
    for _ in 0..lines {
        match rest.find('\n') {
            Some(index) => rest = &rest[index + 1..],
            None => return "",
        }
    }
    rest
}

/// Projects documents into artifacts for one stack configuration.
pub struct Projector {
    config: StackConfig,
    renderer: TemplateRenderer,
    markers: MarkerSyntax,
    generated_at: String,
}

impl Projector {
    /// Create a projector stamping headers with the current time.
    pub fn new(config: StackConfig) -> Self {
        let markers = MarkerSyntax::from_config(&config);
        Self {
            config,
            renderer: TemplateRenderer::new(),
            markers,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Use a fixed header timestamp.
    pub fn with_timestamp(mut self, generated_at: impl Into<String>) -> Self {
        self.generated_at = generated_at.into();
        self
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn markers(&self) -> &MarkerSyntax {
        &self.markers
    }

    /// The rendered generated-file header, without a trailing newline.
    pub fn header(&self) -> String {
        let mut vars = self.base_vars();
        vars.insert("generated_at".to_string(), self.generated_at.clone());
        self.renderer
            .render_content(self.config.header.trim_end_matches('\n'), &vars)
    }

    /// Check whether `content` starts with this stack's header, for any
    /// timestamp. Without a configured header nothing counts as generated.
    pub fn is_generated(&self, content: &str) -> bool {
        const SENTINEL: &str = "\u{0}";
        let mut vars = self.base_vars();
        vars.insert("generated_at".to_string(), SENTINEL.to_string());
        let pattern = self
            .renderer
            .render_content(self.config.header.trim_end_matches('\n'), &vars);
        if pattern.is_empty() {
            return false;
        }

        let mut actual = content.lines();
        pattern.lines().all(|expected| {
            let Some(line) = actual.next() else {
                return false;
            };
            match expected.split_once(SENTINEL) {
                Some((before, after)) => {
                    line.len() >= before.len() + after.len()
                        && line.starts_with(before)
                        && line.ends_with(after)
                }
                None => line == expected,
            }
        })
    }

    /// Project the document, restricted to `scope` when given.
    pub fn project(
        &self,
        doc: &SpecDocument,
        scope: Option<&ScopeSelection>,
    ) -> TemplateResult<Projection> {
        let mut run = ProjectionRun {
            projector: self,
            doc,
            pending: BTreeMap::new(),
            unresolved: BTreeSet::new(),
        };

        for entity in &doc.entities {
            if scope.map_or(true, |s| s.includes_entity(&entity.name)) {
                run.entity(entity)?;
            }
        }
        for def in &doc.enums {
            if scope.map_or(true, |s| s.includes_enum(&def.name)) {
                run.enum_def(def)?;
            }
        }
        for ty in &doc.custom_types {
            if scope.map_or(true, |s| s.includes_custom_type(&ty.name)) {
                run.custom_type(ty)?;
            }
        }
        for op in &doc.operations {
            if scope.map_or(true, |s| s.includes_operation(&op.name)) {
                run.service(op)?;
                run.endpoint(op)?;
                run.tests(op)?;
            }
        }

        if !run.unresolved.is_empty() {
            warn!(
                "Templates reference unknown variables: {}",
                run.unresolved.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        let header = self.header();
        let header_lines = if header.is_empty() { 0 } else { header.lines().count() };
        let mut projection = Projection {
            artifacts: BTreeMap::new(),
            header_lines,
        };
        for (path, pending) in run.pending {
            let artifact = pending.finish(path, &header, &self.markers)?;
            projection.artifacts.insert(artifact.path.clone(), artifact);
        }

        info!("Projected {} artifacts", projection.len());
        Ok(projection)
    }

    /// Resolve the output path for an element, `None` when the kind is disabled.
    pub fn path_for(&self, kind: ArtifactKind, name: &str) -> TemplateResult<Option<String>> {
        let Some(template) = self.config.paths.get(kind) else {
            return Ok(None);
        };
        let path = self
            .renderer
            .render_content(template.trim(), &self.name_vars(name))
            .replace('\\', "/");

        let unsafe_path = path.is_empty()
            || path.ends_with('/')
            || path.contains("{{")
            || Path::new(&path)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if unsafe_path {
            return Err(TemplateError::InvalidPath {
                kind: kind.to_string(),
                path,
            });
        }
        Ok(Some(path.trim_start_matches("./").to_string()))
    }

    fn name_vars(&self, name: &str) -> TemplateVars {
        let mut vars = self.base_vars();
        self.renderer.insert_name_variables(&mut vars, "", name);
        vars
    }

    fn base_vars(&self) -> TemplateVars {
        let mut vars = TemplateVars::new();
        vars.insert("language".to_string(), self.config.language.clone());
        vars.insert("framework".to_string(), self.config.framework.clone());
        vars.insert("ext".to_string(), self.config.file_extension.clone());
        vars.insert("comment_prefix".to_string(), self.config.comment_prefix.clone());
        vars.insert("comment_suffix".to_string(), self.config.comment_suffix.clone());
        for (key, value) in &self.config.settings {
            vars.insert(format!("setting_{}", key), value.clone());
        }
        vars
    }

    fn map_type(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Named(name) => self
                .config
                .type_map
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.clone()),
            TypeRef::List(inner) => {
                let mut vars = TemplateVars::new();
                vars.insert("item".to_string(), self.map_type(inner));
                self.renderer.render_content(&self.config.list_type, &vars)
            }
        }
    }

    fn comments<I, S>(&self, lines: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .map(|line| self.markers.comment(line.as_ref()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A rendered section plus the regions it emits.
struct Section {
    text: String,
    placeholders: Vec<RegionPlaceholder>,
}

#[derive(Default)]
struct PendingArtifact {
    kinds: Vec<ArtifactKind>,
    sources: Vec<String>,
    sections: Vec<Section>,
}

impl PendingArtifact {
    fn finish(self, path: String, header: &str, markers: &MarkerSyntax) -> TemplateResult<Artifact> {
        let body = self
            .sections
            .iter()
            .map(|s| format!("{}\n", s.text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n");
        let content = if header.is_empty() {
            body
        } else {
            format!("{}\n{}", header, body)
        };

        let mut seen = BTreeSet::new();
        let mut placeholders = Vec::new();
        for placeholder in self.sections.into_iter().flat_map(|s| s.placeholders) {
            if !seen.insert(placeholder.name.clone()) {
                return Err(TemplateError::DuplicateRegion {
                    path,
                    region: placeholder.name,
                });
            }
            let start = markers.start_line(&placeholder.name, placeholder.hook, &placeholder.fingerprint);
            if content.contains(&start) {
                placeholders.push(placeholder);
            } else {
                warn!(
                    "Region {} is not placed by the templates of {}",
                    placeholder.name, path
                );
            }
        }

        Ok(Artifact {
            path,
            kinds: self.kinds,
            sources: self.sources,
            content,
            placeholders,
        })
    }
}

struct ProjectionRun<'a> {
    projector: &'a Projector,
    doc: &'a SpecDocument,
    pending: BTreeMap<String, PendingArtifact>,
    unresolved: BTreeSet<String>,
}

impl<'a> ProjectionRun<'a> {
    fn render(&mut self, template: &str, vars: &TemplateVars) -> String {
        self.unresolved
            .extend(self.projector.renderer.unresolved(template, vars));
        self.projector.renderer.render(template, vars)
    }

    fn name_vars(&self, name: &str) -> TemplateVars {
        self.projector.name_vars(name)
    }

    fn path_for(&self, kind: ArtifactKind, name: &str) -> TemplateResult<Option<String>> {
        self.projector.path_for(kind, name)
    }

    fn emit(&mut self, kind: ArtifactKind, name: &str, path: String, section: Section) {
        debug!("Projected {} {} into {}", kind, name, path);
        let pending = self.pending.entry(path).or_default();
        if !pending.kinds.contains(&kind) {
            pending.kinds.push(kind);
        }
        if !pending.sources.iter().any(|s| s == name) {
            pending.sources.push(name.to_string());
        }
        pending.sections.push(section);
    }

    /// Region blocks grouped by hook plus their placeholders. When a `replace`
    /// region exists it becomes the body and the default body is dropped.
    fn regions(&self, custom: &[CustomImpl], vars: &mut TemplateVars, default_body: String) -> Vec<RegionPlaceholder> {
        let markers = &self.projector.markers;
        let mut blocks: HashMap<HookType, Vec<String>> = HashMap::new();
        let mut placeholders = Vec::new();

        for region in custom {
            let fingerprint = contract_fingerprint(region.hook, region.contract.as_deref());
            let default = region
                .contract
                .as_deref()
                .map(|c| markers.comment(&format!("contract: {}", c)))
                .unwrap_or_default();

            let mut block = vec![markers.start_line(&region.name, region.hook, &fingerprint)];
            if !default.is_empty() {
                block.push(default.clone());
            }
            block.push(markers.end_line(&region.name));
            blocks.entry(region.hook).or_default().push(block.join("\n"));

            placeholders.push(RegionPlaceholder {
                name: region.name.clone(),
                hook: region.hook,
                contract: region.contract.clone(),
                fingerprint,
                default_body: default,
            });
        }

        for hook in HookType::all() {
            let text = blocks.remove(&hook).map(|b| b.join("\n")).unwrap_or_default();
            vars.insert(format!("custom_{}", hook), text);
        }
        if vars.get("custom_replace").map_or(true, |r| r.is_empty()) {
            vars.insert("body".to_string(), default_body);
        } else {
            let replace = vars.get("custom_replace").cloned().unwrap_or_default();
            vars.insert("body".to_string(), replace);
        }
        placeholders
    }

    fn fields(&mut self, fields: &[Field]) -> String {
        let template = self.projector.config.templates.field.clone();
        let mut rendered = Vec::new();
        for field in fields {
            let mut vars = self.projector.base_vars();
            self.projector
                .renderer
                .insert_name_variables(&mut vars, "field", &field.name);
            vars.insert("field_type".to_string(), self.projector.map_type(&field.ty));
            vars.insert("field_spec_type".to_string(), field.ty.to_string());
            let marker = if field.is_optional() {
                self.projector.config.optional_marker.clone()
            } else {
                String::new()
            };
            vars.insert("optional_marker".to_string(), marker);

            let constraints = field
                .constraints
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let mut doc = Vec::new();
            if let Some(description) = &field.description {
                doc.push(description.clone());
            }
            if !constraints.is_empty() {
                doc.push(constraints.clone());
            }
            vars.insert("constraints".to_string(), constraints);
            vars.insert("doc".to_string(), self.projector.comments(doc));
            rendered.push(self.render(&template, &vars));
        }
        rendered.join("\n")
    }

    fn entity(&mut self, entity: &Entity) -> TemplateResult<()> {
        let Some(path) = self.path_for(ArtifactKind::Model, &entity.name)? else {
            return Ok(());
        };
        let mut vars = self.name_vars(&entity.name);
        let fields = self.fields(&entity.fields);
        vars.insert("fields".to_string(), fields.clone());
        vars.insert(
            "state_machine".to_string(),
            entity.state_machine.clone().unwrap_or_default(),
        );
        vars.insert("doc".to_string(), self.projector.comments(&entity.constraints));
        let placeholders = self.regions(&entity.custom, &mut vars, fields);

        let template = self.projector.config.templates.model.clone();
        let text = self.render(&template, &vars);
        self.emit(ArtifactKind::Model, &entity.name, path, Section { text, placeholders });
        Ok(())
    }

    fn enum_def(&mut self, def: &EnumDef) -> TemplateResult<()> {
        let Some(path) = self.path_for(ArtifactKind::Enum, &def.name)? else {
            return Ok(());
        };
        let value_template = self.projector.config.templates.enum_value.clone();
        let mut values = Vec::new();
        for value in &def.values {
            let mut vars = self.projector.base_vars();
            vars.insert("value".to_string(), value.value.clone());
            vars.insert(
                "description".to_string(),
                value.description.clone().unwrap_or_default(),
            );
            vars.insert(
                "doc".to_string(),
                self.projector.comments(value.description.iter()),
            );
            values.push(self.render(&value_template, &vars));
        }

        let mut vars = self.name_vars(&def.name);
        vars.insert("values".to_string(), values.join("\n"));
        let template = self.projector.config.templates.enum_def.clone();
        let text = self.render(&template, &vars);
        self.emit(
            ArtifactKind::Enum,
            &def.name,
            path,
            Section {
                text,
                placeholders: Vec::new(),
            },
        );
        Ok(())
    }

    fn custom_type(&mut self, ty: &CustomType) -> TemplateResult<()> {
        let Some(path) = self.path_for(ArtifactKind::CustomType, &ty.name)? else {
            return Ok(());
        };
        let base = ty.base.clone().unwrap_or_else(|| "String".to_string());

        let mut doc = vec![format!("Base: {}", base)];
        let bounds = [
            ("Min Length", &ty.min_length),
            ("Max Length", &ty.max_length),
            ("Allowed", &ty.allowed),
            ("Forbidden", &ty.forbidden),
        ];
        for (label, value) in bounds {
            if let Some(value) = value {
                doc.push(format!("{}: {}", label, value));
            }
        }
        doc.extend(ty.rules.iter().map(|r| format!("Rule: {}", r)));
        doc.extend(ty.valid_examples.iter().map(|e| format!("Valid: {}", e)));
        doc.extend(ty.invalid_examples.iter().map(|e| match &e.reason {
            Some(reason) => format!("Invalid: {} - {}", e.value, reason),
            None => format!("Invalid: {}", e.value),
        }));

        let mut vars = self.name_vars(&ty.name);
        vars.insert("base".to_string(), base.clone());
        vars.insert("base_type".to_string(), self.projector.map_type(&TypeRef::Named(base)));
        vars.insert("min_length".to_string(), ty.min_length.clone().unwrap_or_default());
        vars.insert("max_length".to_string(), ty.max_length.clone().unwrap_or_default());
        vars.insert("doc".to_string(), self.projector.comments(doc));

        let template = self.projector.config.templates.custom_type.clone();
        let text = self.render(&template, &vars);
        self.emit(
            ArtifactKind::CustomType,
            &ty.name,
            path,
            Section {
                text,
                placeholders: Vec::new(),
            },
        );
        Ok(())
    }

    /// Variables shared by the service and endpoint sections of an operation.
    fn operation_vars(&self, op: &Operation) -> TemplateVars {
        let mut vars = self.name_vars(&op.name);
        let (method, path) = op
            .endpoint
            .as_ref()
            .map(|e| (e.method.clone(), e.path.clone()))
            .unwrap_or_default();
        vars.insert("method".to_string(), method);
        vars.insert("path".to_string(), path);

        let success = op.success.first();
        vars.insert(
            "success_status".to_string(),
            success.map_or(200, |s| s.status).to_string(),
        );
        vars.insert(
            "response_type".to_string(),
            success
                .and_then(|s| s.ty.as_ref())
                .map(|ty| self.projector.map_type(ty))
                .unwrap_or_else(|| "void".to_string()),
        );
        vars
    }

    fn service(&mut self, op: &Operation) -> TemplateResult<()> {
        let Some(path) = self.path_for(ArtifactKind::Service, &op.name)? else {
            return Ok(());
        };
        let templates = self.projector.config.templates.clone();
        let mut vars = self.operation_vars(op);

        let params: Vec<Field> = op.input.all().cloned().collect();
        let params = self.fields(&params);
        vars.insert("params".to_string(), params);

        let mut errors = Vec::new();
        for error in &op.errors {
            let mut error_vars = self.projector.base_vars();
            error_vars.insert("code".to_string(), error.code.clone());
            error_vars.insert("status".to_string(), error.status.to_string());
            error_vars.insert("condition".to_string(), error.condition.clone());
            error_vars.insert("message".to_string(), error.message.clone());
            error_vars.insert("message_literal".to_string(), format!("{:?}", error.message));
            error_vars.insert(
                "doc".to_string(),
                self.projector.comments([format!("{}: {}", error.code, error.condition)]),
            );
            errors.push(self.render(&templates.error_case, &error_vars));
        }
        vars.insert("errors".to_string(), errors.join("\n"));

        let doc = self.doc;
        let mut rules = Vec::new();
        for rule in doc.rules_for(&op.name) {
            let mut lines = vec![match &rule.description {
                Some(description) => format!("Rule {}: {}", rule.name, description),
                None => format!("Rule {}", rule.name),
            }];
            for clause in &rule.clauses {
                lines.push(format!("When {} then {}", clause.when, clause.then));
            }
            lines.extend(rule.tags.iter().map(|t| format!("[{}]", t)));

            let mut rule_vars = self.projector.base_vars();
            self.projector
                .renderer
                .insert_name_variables(&mut rule_vars, "rule", &rule.name);
            rule_vars.insert("doc".to_string(), self.projector.comments(lines));
            rule_vars.insert(
                "category".to_string(),
                rule.category.clone().unwrap_or_default(),
            );
            rules.push(self.render(&templates.rule, &rule_vars));
        }
        vars.insert("rules".to_string(), rules.join("\n"));

        let concerns: Vec<String> = doc
            .concerns_for(&op.name)
            .map(|c| match &c.behavior {
                Some(behavior) => format!("Concern {}: {}", c.name, behavior),
                None => format!("Concern {}", c.name),
            })
            .collect();
        vars.insert("concerns".to_string(), self.projector.comments(concerns));

        let mut notes: Vec<String> = Vec::new();
        notes.extend(op.preconditions.iter().map(|p| format!("Precondition: {}", p)));
        notes.extend(op.effects.iter().map(|e| format!("Effect: {}", e)));
        notes.extend(op.sla.iter().map(|s| format!("SLA: {}", s)));
        vars.insert("doc".to_string(), self.projector.comments(notes));

        let default_body = self.render(&templates.default_body, &vars);
        let placeholders = self.regions(&op.custom, &mut vars, default_body);

        let text = self.render(&templates.service, &vars);
        self.emit(ArtifactKind::Service, &op.name, path, Section { text, placeholders });
        Ok(())
    }

    fn endpoint(&mut self, op: &Operation) -> TemplateResult<()> {
        if op.endpoint.is_none() {
            return Ok(());
        }
        let Some(path) = self.path_for(ArtifactKind::Endpoint, &op.name)? else {
            return Ok(());
        };
        let vars = self.operation_vars(op);
        let template = self.projector.config.templates.endpoint.clone();
        let text = self.render(&template, &vars);
        self.emit(
            ArtifactKind::Endpoint,
            &op.name,
            path,
            Section {
                text,
                placeholders: Vec::new(),
            },
        );
        Ok(())
    }

    fn tests(&mut self, op: &Operation) -> TemplateResult<()> {
        if op.tests.is_empty() {
            return Ok(());
        }
        let Some(path) = self.path_for(ArtifactKind::Test, &op.name)? else {
            return Ok(());
        };
        let templates = self.projector.config.templates.clone();

        let mut cases = Vec::new();
        for test in &op.tests {
            let case_vars = self.test_case_vars(op, test, &templates.binding, &templates.assertion);
            cases.push(self.render(&templates.test_case, &case_vars));
        }

        let mut vars = self.name_vars(&op.name);
        self.projector
            .renderer
            .insert_name_variables(&mut vars, "operation", &op.name);
        vars.insert("cases".to_string(), cases.join("\n\n"));
        let text = self.render(&templates.test, &vars);
        self.emit(
            ArtifactKind::Test,
            &op.name,
            path,
            Section {
                text,
                placeholders: Vec::new(),
            },
        );
        Ok(())
    }

    fn test_case_vars(
        &mut self,
        op: &Operation,
        test: &TestCase,
        binding_template: &str,
        assertion_template: &str,
    ) -> TemplateVars {
        let projector = self.projector;
        let renderer = &projector.renderer;
        let mut vars = projector.base_vars();
        renderer.insert_name_variables(&mut vars, "test", &test.name);
        renderer.insert_name_variables(&mut vars, "operation", &op.name);

        let mut given = Vec::new();
        for binding in &test.given {
            let mut binding_vars = self.projector.base_vars();
            binding_vars.insert("binding".to_string(), binding.name.clone());
            binding_vars.insert("literal".to_string(), binding.literal.clone());
            given.push(self.render(binding_template, &binding_vars));
        }
        vars.insert("given".to_string(), given.join("\n"));

        // The invoked operation is called by its generated function name.
        let when = match (test.invoked_operation(), test.when.as_deref()) {
            (Some(invoked), Some(text)) => {
                let text = text.trim();
                let args = &text[text.find('(').unwrap_or(text.len())..];
                let args = if args.is_empty() { "()" } else { args };
                format!("{}{}", renderer.to_camel_case(invoked), args)
            }
            _ => format!("{}({{}})", renderer.to_camel_case(&op.name)),
        };
        vars.insert("when".to_string(), when);

        let mut assertions = Vec::new();
        for assertion in &test.then {
            let mut assertion_vars = self.projector.base_vars();
            assertion_vars.insert("subject".to_string(), assertion.subject.clone());
            assertion_vars.insert("operator".to_string(), assertion.operator.symbol().to_string());
            assertion_vars.insert("operator_word".to_string(), assertion.operator.word().to_string());
            assertion_vars.insert("expected".to_string(), assertion.expected.clone());
            assertions.push(self.render(assertion_template, &assertion_vars));
        }
        vars.insert("assertions".to_string(), assertions.join("\n"));
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use husl_spec::SpecParser;

    const WIDGETS: &str = "# Schema\nEntity: Widget\n  id: UUID (required)\n  label: String (optional) // shown in lists\n  Custom: pricing (extend, contract:price(w: Widget) -> Money)\n\n# Operations\nOperation: GetWidget\n  Endpoint: GET /widgets/{id}\n  Input:\n    Path:\n      id: UUID (required)\n  Success: 200 Widget\n  Custom: audit (after)\n";

    fn projector() -> Projector {
        Projector::new(StackConfig::default()).with_timestamp("2026-01-01T00:00:00Z")
    }

    #[test]
    fn test_clean_generation_produces_two_artifacts() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projection = projector().project(&doc, None).unwrap();

        let paths: Vec<&str> = projection.paths().collect();
        assert_eq!(paths, vec!["src/models/widget.ts", "src/operations/get-widget.ts"]);

        let op = projection.get("src/operations/get-widget.ts").unwrap();
        assert_eq!(op.kinds, vec![ArtifactKind::Service, ArtifactKind::Endpoint]);
        assert!(op.content.contains("export async function getWidget(input: GetWidgetInput): Promise<Widget> {"));
        assert!(op.content.contains("export const getWidgetRoute = {"));
        assert!(op.content.contains("  method: \"GET\","));
    }

    #[test]
    fn test_model_fields_and_regions() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let projection = projector().project(&doc, None).unwrap();
        let model = projection.get("src/models/widget.ts").unwrap();

        assert!(model.content.starts_with("// Generated by husl at 2026-01-01T00:00:00Z.\n"));
        assert!(model.content.contains("  id: string;\n"));
        assert!(model.content.contains("  // shown in lists\n  // optional\n  label?: string;\n"));

        let pricing = model.placeholder("pricing").unwrap();
        assert_eq!(pricing.hook, HookType::Extend);
        assert_eq!(pricing.default_body, "// contract: price(w: Widget) -> Money");
        let start = format!("  // HUSL-CUSTOM-BEGIN pricing hook=extend contract={}\n", pricing.fingerprint);
        assert!(model.content.contains(&start));
        assert!(model.content.contains("  // HUSL-CUSTOM-END pricing\n}"));
    }

    #[test]
    fn test_replace_region_drops_default_logic() {
        let text = WIDGETS.replace("Custom: audit (after)", "Custom: lookup (replace, contract:find(id: UUID) -> Widget)");
        let doc = SpecParser::parse(&text).unwrap();
        let projection = projector().project(&doc, None).unwrap();
        let op = projection.get("src/operations/get-widget.ts").unwrap();

        assert!(!op.content.contains("is not implemented"));
        assert!(op.content.contains("  // contract: find(id: UUID) -> Widget\n"));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let doc = SpecParser::parse(WIDGETS).unwrap();
        let first = projector().project(&doc, None).unwrap();
        let second = projector().project(&doc, None).unwrap();
        assert_eq!(first, second);

        let later = Projector::new(StackConfig::default())
            .with_timestamp("2030-06-01T12:00:00Z")
            .project(&doc, None)
            .unwrap();
        for (a, b) in first.iter().zip(later.iter()) {
            assert_ne!(a.content, b.content);
            assert_eq!(
                strip_header(&a.content, first.header_lines),
                strip_header(&b.content, later.header_lines)
            );
        }
    }

    #[test]
    fn test_disabled_kind_and_unsafe_path() {
        let doc = SpecParser::parse(WIDGETS).unwrap();

        let mut config = StackConfig::default();
        config.paths.model = None;
        let projection = Projector::new(config).project(&doc, None).unwrap();
        assert_eq!(projection.len(), 1);

        let mut config = StackConfig::default();
        config.paths.model = Some("../{{name}}.ts".to_string());
        let err = Projector::new(config).project(&doc, None).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidPath { .. }));
    }

    #[test]
    fn test_path_for_element_names() {
        let projector = projector();
        assert_eq!(
            projector.path_for(ArtifactKind::Service, "PayOrder").unwrap().as_deref(),
            Some("src/operations/pay-order.ts")
        );
        assert_eq!(
            projector.path_for(ArtifactKind::Test, "PayOrder").unwrap().as_deref(),
            Some("tests/pay-order.test.ts")
        );

        let mut config = StackConfig::default();
        config.paths.test = None;
        assert_eq!(Projector::new(config).path_for(ArtifactKind::Test, "PayOrder").unwrap(), None);
    }

    #[test]
    fn test_same_region_twice_in_one_artifact() {
        let text = WIDGETS.replace("Custom: audit (after)", "Custom: pricing (after)");
        let doc = SpecParser::parse(&text).unwrap();
        let mut config = StackConfig::default();
        config.paths.model = Some("src/all.ts".to_string());
        config.paths.service = Some("src/all.ts".to_string());
        config.paths.endpoint = Some("src/all.ts".to_string());

        let err = Projector::new(config).project(&doc, None).unwrap_err();
        assert!(matches!(err, TemplateError::DuplicateRegion { region, .. } if region == "pricing"));
    }

    #[test]
    fn test_recognizes_generated_header() {
        let projector = projector();
        assert!(projector.is_generated(
            "// Generated by husl at 2030-06-01T12:00:00Z.\n// Edit only inside custom regions.\nbody\n"
        ));
        assert!(!projector.is_generated("// Generated by hand.\n// Edit only inside custom regions.\n"));
        assert!(!projector.is_generated("export {}\n"));

        let mut config = StackConfig::default();
        config.header = String::new();
        assert!(!Projector::new(config).is_generated("anything\n"));
    }

    #[test]
    fn test_strip_header() {
        assert_eq!(strip_header("a\nb\nbody\n", 2), "body\n");
        assert_eq!(strip_header("a\n", 3), "");
        assert_eq!(strip_header("body", 0), "body");
    }
}
