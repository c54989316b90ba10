//! Rendering documents back to text.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::SpecResult;
use crate::models::*;

const INDENT: &str = "  ";

/// Writer for specification documents.
///
/// Output parses back to an equal document.
pub struct SpecWriter;

impl SpecWriter {
    /// Render a document to text.
    pub fn write(doc: &SpecDocument) -> SpecResult<String> {
        let mut sections = Vec::new();
        if !doc.preamble.is_empty() {
            sections.push(doc.preamble.clone());
        }
        for kind in Self::section_order(doc) {
            sections.push(Self::section(doc, kind)?);
        }

        let mut out = sections.join("\n\n");
        out.push('\n');
        Ok(out)
    }

    /// Render a document and write it to disk.
    pub fn write_file(doc: &SpecDocument, path: impl AsRef<Path>) -> SpecResult<()> {
        let path = path.as_ref();
        debug!("Writing specification to {:?}", path);
        fs::write(path, Self::write(doc)?)?;
        Ok(())
    }

    /// Sections in their original order, followed by populated sections the
    /// layout does not mention.
    fn section_order(doc: &SpecDocument) -> Vec<SectionKind> {
        let mut order = doc.layout.clone();
        let populated = [
            (SectionKind::Overview, doc.overview.is_some()),
            (SectionKind::Schema, !(doc.entities.is_empty() && doc.enums.is_empty() && doc.custom_types.is_empty())),
            (SectionKind::StateMachines, !doc.state_machines.is_empty()),
            (SectionKind::Rules, !doc.rules.is_empty()),
            (SectionKind::Operations, !doc.operations.is_empty()),
            (SectionKind::Events, !doc.events.is_empty()),
            (SectionKind::BackgroundJobs, !doc.jobs.is_empty()),
            (SectionKind::Concerns, !doc.concerns.is_empty()),
            (SectionKind::VersionHistory, !doc.version_history.entries.is_empty()),
        ];
        for (kind, present) in populated {
            if present && !order.contains(&kind) {
                order.push(kind);
            }
        }
        for index in 0..doc.extra_sections.len() {
            if !order.contains(&SectionKind::Opaque(index)) {
                order.push(SectionKind::Opaque(index));
            }
        }
        order
    }

    fn section(doc: &SpecDocument, kind: SectionKind) -> SpecResult<String> {
        if let SectionKind::Opaque(index) = kind {
            return Ok(match doc.extra_sections.get(index) {
                Some(section) => Self::heading(&section.title, &section.body),
                None => String::new(),
            });
        }

        let title = kind.title().unwrap_or_default();
        let blocks: Vec<String> = match kind {
            SectionKind::Overview => {
                return Ok(Self::heading(title, doc.overview.as_deref().unwrap_or_default()))
            }
            SectionKind::Schema => doc
                .entities
                .iter()
                .map(Self::entity)
                .chain(doc.enums.iter().map(Self::enum_def))
                .chain(doc.custom_types.iter().map(Self::custom_type))
                .collect(),
            SectionKind::StateMachines => doc.state_machines.iter().map(Self::state_machine).collect(),
            SectionKind::Rules => doc.rules.iter().map(Self::rule).collect(),
            SectionKind::Operations => doc.operations.iter().map(Self::operation).collect(),
            SectionKind::Events => doc.events.iter().map(Self::event).collect(),
            SectionKind::BackgroundJobs => doc.jobs.iter().map(Self::job).collect(),
            SectionKind::Concerns => doc.concerns.iter().map(Self::concern).collect(),
            SectionKind::VersionHistory => doc
                .version_history
                .entries
                .iter()
                .map(Self::version_entry)
                .collect::<SpecResult<_>>()?,
            SectionKind::Opaque(_) => Vec::new(),
        };
        Ok(Self::heading(title, &blocks.join("\n\n")))
    }

    fn heading(title: &str, body: &str) -> String {
        if body.is_empty() {
            format!("# {}", title)
        } else {
            format!("# {}\n\n{}", title, body)
        }
    }

    fn line(out: &mut String, depth: usize, text: impl AsRef<str>) {
        out.push('\n');
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push_str(text.as_ref());
    }

    fn opt(out: &mut String, depth: usize, key: &str, value: &Option<String>) {
        if let Some(value) = value {
            Self::line(out, depth, format!("{}: {}", key, value));
        }
    }

    fn items(out: &mut String, depth: usize, key: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        Self::line(out, depth, format!("{}:", key));
        for item in items {
            Self::line(out, depth + 1, format!("- {}", item));
        }
    }

    /// `name: Type (constraints) // description`
    pub fn field_line(field: &Field) -> String {
        let mut line = format!("{}: {}", field.name, field.ty);
        if !field.constraints.is_empty() {
            let tokens: Vec<String> = field.constraints.iter().map(|c| c.to_string()).collect();
            let _ = write!(line, " ({})", tokens.join(", "));
        }
        if let Some(description) = &field.description {
            let _ = write!(line, " // {}", description);
        }
        line
    }

    pub fn custom_line(custom: &CustomImpl) -> String {
        match &custom.contract {
            Some(contract) => format!("Custom: {} ({}, contract:{})", custom.name, custom.hook, contract),
            None => format!("Custom: {} ({})", custom.name, custom.hook),
        }
    }

    fn entity(entity: &Entity) -> String {
        let mut out = format!("Entity: {}", entity.name);
        for field in &entity.fields {
            Self::line(&mut out, 1, Self::field_line(field));
        }
        Self::items(&mut out, 1, "Constraints", &entity.constraints);
        Self::opt(&mut out, 1, "State Machine", &entity.state_machine);
        for custom in &entity.custom {
            Self::line(&mut out, 1, Self::custom_line(custom));
        }
        out
    }

    fn enum_def(def: &EnumDef) -> String {
        let mut out = format!("{} Enum:", def.name);
        for value in &def.values {
            match &value.description {
                Some(description) => Self::line(&mut out, 1, format!("{}: {}", value.value, description)),
                None => Self::line(&mut out, 1, &value.value),
            }
        }
        out
    }

    fn custom_type(ty: &CustomType) -> String {
        let mut out = format!("Type: {}", ty.name);
        Self::opt(&mut out, 1, "Base", &ty.base);
        Self::opt(&mut out, 1, "Min Length", &ty.min_length);
        Self::opt(&mut out, 1, "Max Length", &ty.max_length);
        Self::opt(&mut out, 1, "Allowed", &ty.allowed);
        Self::opt(&mut out, 1, "Forbidden", &ty.forbidden);
        for rule in &ty.rules {
            Self::line(&mut out, 1, format!("Rule: {}", rule));
        }
        for example in &ty.valid_examples {
            Self::line(&mut out, 1, format!("Valid: {}", example));
        }
        for example in &ty.invalid_examples {
            match &example.reason {
                Some(reason) => Self::line(&mut out, 1, format!("Invalid: {} - {}", example.value, reason)),
                None => Self::line(&mut out, 1, format!("Invalid: {}", example.value)),
            }
        }
        out
    }

    fn state_machine(machine: &StateMachine) -> String {
        let mut out = format!("State Machine: {}", machine.name);
        Self::opt(&mut out, 1, "Entity", &machine.entity);
        Self::opt(&mut out, 1, "Initial", &machine.initial);
        for state in &machine.states {
            match &state.description {
                Some(description) => Self::line(&mut out, 1, format!("State: {} - {}", state.name, description)),
                None => Self::line(&mut out, 1, format!("State: {}", state.name)),
            }
            Self::opt(&mut out, 2, "Entry", &state.entry_condition);
            if !state.allowed.is_empty() {
                Self::line(&mut out, 2, format!("Allowed: {}", state.allowed.join(", ")));
            }
            if !state.prohibited.is_empty() {
                Self::line(&mut out, 2, format!("Prohibited: {}", state.prohibited.join(", ")));
            }
        }
        for transition in &machine.transitions {
            Self::line(
                &mut out,
                1,
                format!(
                    "Transition: {} -> {} on {}",
                    transition.source, transition.target, transition.trigger
                ),
            );
            for precondition in &transition.preconditions {
                Self::line(&mut out, 2, format!("Precondition: {}", precondition));
            }
            for effect in &transition.effects {
                Self::line(&mut out, 2, format!("Effect: {}", effect));
            }
        }
        out
    }

    fn rule(rule: &Rule) -> String {
        let mut out = format!("Rule: {}", rule.name);
        Self::opt(&mut out, 1, "Category", &rule.category);
        Self::opt(&mut out, 1, "Description", &rule.description);
        for clause in &rule.clauses {
            Self::line(&mut out, 1, format!("When: {}", clause.when));
            Self::line(&mut out, 1, format!("Then: {}", clause.then));
        }
        Self::opt(&mut out, 1, "Validation", &rule.validation);
        Self::opt(&mut out, 1, "Implementation", &rule.implementation);
        Self::opt(&mut out, 1, "Example", &rule.example);
        if !rule.applies_to.is_empty() {
            Self::line(&mut out, 1, format!("Applies To: {}", rule.applies_to.join(", ")));
        }
        if !rule.tags.is_empty() {
            let tags: Vec<String> = rule.tags.iter().map(|t| t.to_string()).collect();
            Self::line(&mut out, 1, format!("Tags: {}", tags.join(", ")));
        }
        out
    }

    fn response(key: &str, response: &ResponseShape) -> String {
        match &response.ty {
            Some(ty) => format!("{}: {} {}", key, response.status, ty),
            None => format!("{}: {}", key, response.status),
        }
    }

    fn operation(op: &Operation) -> String {
        let mut out = format!("Operation: {}", op.name);
        if let Some(endpoint) = &op.endpoint {
            Self::line(&mut out, 1, format!("Endpoint: {} {}", endpoint.method, endpoint.path));
        }
        if !op.input.is_empty() {
            Self::line(&mut out, 1, "Input:");
            let groups = [
                ("Path", &op.input.path),
                ("Body", &op.input.body),
                ("Query", &op.input.query),
                ("Header", &op.input.header),
            ];
            for (key, params) in groups {
                if params.is_empty() {
                    continue;
                }
                Self::line(&mut out, 2, format!("{}:", key));
                for param in params.iter() {
                    Self::line(&mut out, 3, Self::field_line(param));
                }
            }
        }
        for response in &op.success {
            Self::line(&mut out, 1, Self::response("Success", response));
        }
        for response in &op.failures {
            Self::line(&mut out, 1, Self::response("Failure", response));
        }
        Self::items(&mut out, 1, "Preconditions", &op.preconditions);
        Self::items(&mut out, 1, "Effects", &op.effects);
        for case in &op.errors {
            Self::line(
                &mut out,
                1,
                format!(
                    "Error: {} | {} | {} | {}",
                    case.code, case.status, case.condition, case.message
                ),
            );
        }
        for sla in &op.sla {
            Self::line(&mut out, 1, format!("SLA: {}", sla));
        }
        for custom in &op.custom {
            Self::line(&mut out, 1, Self::custom_line(custom));
        }
        for test in &op.tests {
            Self::line(&mut out, 1, format!("Test: {}", test.name));
            for binding in &test.given {
                Self::line(&mut out, 2, format!("Given: {} = {}", binding.name, binding.literal));
            }
            Self::opt(&mut out, 2, "When", &test.when);
            for assertion in &test.then {
                Self::line(
                    &mut out,
                    2,
                    format!(
                        "Then: {} {} {}",
                        assertion.subject,
                        assertion.operator.symbol(),
                        assertion.expected
                    ),
                );
            }
        }
        out
    }

    fn event(event: &Event) -> String {
        let mut out = format!("Event: {}", event.name);
        Self::opt(&mut out, 1, "Trigger", &event.trigger);
        Self::opt(&mut out, 1, "Payload", &event.payload);
        Self::opt(&mut out, 1, "Description", &event.description);
        out
    }

    fn job(job: &BackgroundJob) -> String {
        let mut out = format!("Job: {}", job.name);
        Self::opt(&mut out, 1, "Schedule", &job.schedule);
        if !job.invokes.is_empty() {
            Self::line(&mut out, 1, format!("Invokes: {}", job.invokes.join(", ")));
        }
        Self::opt(&mut out, 1, "Behavior", &job.behavior);
        out
    }

    fn concern(concern: &CrossCuttingConcern) -> String {
        let mut out = format!("Concern: {}", concern.name);
        if !concern.scope.is_empty() {
            Self::line(&mut out, 1, format!("Scope: {}", concern.scope.join(", ")));
        }
        Self::opt(&mut out, 1, "Behavior", &concern.behavior);
        out
    }

    fn version_entry(entry: &VersionEntry) -> SpecResult<String> {
        let mut out = match &entry.change_type {
            Some(change) => format!("Version: {} ({})", entry.version, change),
            None => format!("Version: {}", entry.version),
        };
        for change in &entry.changes {
            Self::line(&mut out, 1, format!("- {}", change));
        }
        if let Some(metadata) = &entry.refactoring {
            Self::line(&mut out, 1, "Refactoring:");
            let yaml = serde_yaml::to_string(metadata)?;
            for line in yaml.lines().filter(|l| !l.trim().is_empty() && *l != "---") {
                Self::line(&mut out, 2, line);
            }
        }
        Ok(out)
    }
}
