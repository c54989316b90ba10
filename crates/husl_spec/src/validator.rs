//! Semantic validation of parsed documents.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::literals;
use crate::models::{
    Constraint, CustomImpl, CustomType, EnumDef, Entity, Field, Operation, Rule, RuleTag,
    SpecDocument, StateMachine,
};
use crate::naming::NamingRules;

/// Issue severity. Only errors fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Stable machine code, e.g. `unresolved-type`.
    pub code: String,
    /// Path to the offending element, e.g. `Entity Widget / field ownerId`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.location, self.message)
    }
}

/// Validation result with details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn add_error(
        &mut self,
        code: &str,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.valid = false;
        self.push(Severity::Error, code, location.into(), message.into());
    }

    pub fn add_warning(
        &mut self,
        code: &str,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Severity::Warning, code, location.into(), message.into());
    }

    fn push(&mut self, severity: Severity, code: &str, location: String, message: String) {
        self.issues.push(ValidationIssue {
            severity,
            code: code.to_string(),
            location,
            message,
        });
    }

    pub fn merge(&mut self, other: ValidationReport) {
        if !other.valid {
            self.valid = false;
        }
        self.issues.extend(other.issues);
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// Validator for parsed documents.
///
/// Checks run in document order and never consult anything outside the
/// document, so identical input yields an identical report.
pub struct SpecValidator;

impl SpecValidator {
    /// Validate an entire document.
    pub fn validate(doc: &SpecDocument) -> ValidationReport {
        let naming = NamingRules::new();
        let mut report = ValidationReport::new();

        report.merge(Self::validate_unique_names(doc));

        for entity in &doc.entities {
            report.merge(Self::validate_entity(doc, &naming, entity));
        }
        for def in &doc.enums {
            report.merge(Self::validate_enum(&naming, def));
        }
        for ty in &doc.custom_types {
            report.merge(Self::validate_custom_type(doc, &naming, ty));
        }
        for machine in &doc.state_machines {
            report.merge(Self::validate_state_machine(doc, &naming, machine));
        }
        for rule in &doc.rules {
            report.merge(Self::validate_rule(doc, rule));
        }
        for op in &doc.operations {
            report.merge(Self::validate_operation(doc, &naming, op));
        }
        for job in &doc.jobs {
            let location = format!("Job {}", job.name);
            for op in &job.invokes {
                Self::check_operation(doc, &mut report, &location, op);
            }
        }
        for concern in &doc.concerns {
            let location = format!("Concern {}", concern.name);
            for op in concern.scope.iter().filter(|s| s.as_str() != "*") {
                Self::check_operation(doc, &mut report, &location, op);
            }
        }

        debug!(
            "Validation finished: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
        report
    }

    /// Element names must be unique within their name space. Entities, enums
    /// and custom types share the type name space.
    pub fn validate_unique_names(doc: &SpecDocument) -> ValidationReport {
        let mut report = ValidationReport::new();

        let types = doc
            .entities
            .iter()
            .map(|e| ("Entity", e.name.as_str()))
            .chain(doc.enums.iter().map(|e| ("Enum", e.name.as_str())))
            .chain(doc.custom_types.iter().map(|t| ("Type", t.name.as_str())));
        Self::check_duplicates(&mut report, types);
        Self::check_duplicates(
            &mut report,
            doc.state_machines.iter().map(|m| ("State Machine", m.name.as_str())),
        );
        Self::check_duplicates(&mut report, doc.rules.iter().map(|r| ("Rule", r.name.as_str())));
        Self::check_duplicates(
            &mut report,
            doc.operations.iter().map(|o| ("Operation", o.name.as_str())),
        );
        Self::check_duplicates(&mut report, doc.events.iter().map(|e| ("Event", e.name.as_str())));
        Self::check_duplicates(&mut report, doc.jobs.iter().map(|j| ("Job", j.name.as_str())));

        report
    }

    fn check_duplicates<'a>(
        report: &mut ValidationReport,
        names: impl Iterator<Item = (&'static str, &'a str)>,
    ) {
        let mut seen = HashSet::new();
        for (kind, name) in names {
            if !seen.insert(name) {
                report.add_error(
                    "duplicate-name",
                    format!("{} {}", kind, name),
                    format!("`{}` is declared more than once", name),
                );
            }
        }
    }

    /// Validate an entity and its fields.
    pub fn validate_entity(
        doc: &SpecDocument,
        naming: &NamingRules,
        entity: &Entity,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("Entity {}", entity.name);

        if !naming.is_pascal_case(&entity.name) {
            report.add_warning(
                "naming-convention",
                &location,
                "entity names should be PascalCase",
            );
        }

        let mut seen = HashSet::new();
        for field in &entity.fields {
            let field_location = format!("{} / field {}", location, field.name);
            if !seen.insert(field.name.as_str()) {
                report.add_error(
                    "duplicate-field",
                    &field_location,
                    format!("field `{}` is declared more than once", field.name),
                );
            }
            report.merge(Self::validate_field(doc, naming, &field_location, field));
        }

        if let Some(machine) = &entity.state_machine {
            if doc.state_machine(machine).is_none() {
                report.add_error(
                    "unknown-state-machine",
                    &location,
                    format!("state machine `{}` is not declared", machine),
                );
            }
        }

        Self::check_regions(&mut report, &location, &entity.custom);
        report
    }

    /// Validate a field or operation parameter.
    pub fn validate_field(
        doc: &SpecDocument,
        naming: &NamingRules,
        location: &str,
        field: &Field,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        if !naming.is_camel_case(&field.name) {
            report.add_warning("naming-convention", location, "field names should be camelCase");
        }

        let type_name = field.ty.base_name();
        if !doc.resolves_type(type_name) {
            report.add_error(
                "unresolved-type",
                location,
                format!("type `{}` is neither declared nor built in", type_name),
            );
        }

        if field.is_required() && field.is_optional() {
            report.add_error(
                "conflicting-constraints",
                location,
                "`required` and `optional` are mutually exclusive",
            );
        }

        for constraint in &field.constraints {
            match constraint {
                Constraint::References { entity, field: target } => {
                    match doc.entity(entity) {
                        None => report.add_error(
                            "unresolved-reference",
                            location,
                            format!("referenced entity `{}` is not declared", entity),
                        ),
                        Some(referenced) if referenced.field(target).is_none() => report.add_error(
                            "unresolved-reference",
                            location,
                            format!("entity `{}` has no field `{}`", entity, target),
                        ),
                        Some(_) => {}
                    }
                }
                Constraint::Default(value) => {
                    if let Some(def) = doc.enum_def(type_name) {
                        let qualified = format!("{}.", def.name);
                        let value = value.strip_prefix(&qualified).unwrap_or(value);
                        if !def.has_value(value) {
                            report.add_error(
                                "unknown-enum-value",
                                location,
                                format!("default `{}` is not a value of enum {}", value, def.name),
                            );
                        }
                    }
                }
                Constraint::Conditional(expr) => {
                    Self::check_literals(doc, &mut report, location, expr);
                }
                _ => {}
            }
        }

        report
    }

    pub fn validate_enum(naming: &NamingRules, def: &EnumDef) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("Enum {}", def.name);

        if !naming.is_pascal_case(&def.name) {
            report.add_warning("naming-convention", &location, "enum names should be PascalCase");
        }
        if def.values.is_empty() {
            report.add_warning("empty-enum", &location, "enum declares no values");
        }

        let mut seen = HashSet::new();
        for value in &def.values {
            if !seen.insert(value.value.as_str()) {
                report.add_error(
                    "duplicate-enum-value",
                    &location,
                    format!("value `{}` is declared more than once", value.value),
                );
            }
        }
        report
    }

    pub fn validate_custom_type(
        doc: &SpecDocument,
        naming: &NamingRules,
        ty: &CustomType,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("Type {}", ty.name);

        if !naming.is_pascal_case(&ty.name) {
            report.add_warning("naming-convention", &location, "type names should be PascalCase");
        }
        match &ty.base {
            Some(base) if !doc.resolves_type(base) => report.add_error(
                "unresolved-type",
                &location,
                format!("base type `{}` is neither declared nor built in", base),
            ),
            Some(_) => {}
            None => report.add_warning("missing-base-type", &location, "no `Base:` declared"),
        }
        report
    }

    pub fn validate_state_machine(
        doc: &SpecDocument,
        naming: &NamingRules,
        machine: &StateMachine,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("State Machine {}", machine.name);

        if !naming.is_pascal_case(&machine.name) {
            report.add_warning(
                "naming-convention",
                &location,
                "state machine names should be PascalCase",
            );
        }

        match &machine.entity {
            Some(entity) if doc.entity(entity).is_none() => report.add_error(
                "unresolved-entity",
                &location,
                format!("owning entity `{}` is not declared", entity),
            ),
            Some(_) => {}
            None => report.add_warning("missing-entity", &location, "no owning `Entity:` declared"),
        }

        match &machine.initial {
            Some(initial) if !machine.has_state(initial) => report.add_error(
                "unknown-state",
                &location,
                format!("initial state `{}` is not declared", initial),
            ),
            Some(_) => {}
            None => report.add_warning("missing-initial-state", &location, "no `Initial:` declared"),
        }

        let mut seen = HashSet::new();
        for state in &machine.states {
            let state_location = format!("{} / state {}", location, state.name);
            if !seen.insert(state.name.as_str()) {
                report.add_error(
                    "duplicate-state",
                    &state_location,
                    format!("state `{}` is declared more than once", state.name),
                );
            }
            for op in state.allowed.iter().chain(state.prohibited.iter()) {
                Self::check_operation(doc, &mut report, &state_location, op);
            }
            if let Some(entry) = &state.entry_condition {
                Self::check_literals(doc, &mut report, &state_location, entry);
            }
        }

        let mut pairs = HashSet::new();
        for transition in &machine.transitions {
            let transition_location = format!(
                "{} / transition {} -> {}",
                location, transition.source, transition.target
            );
            for state in [&transition.source, &transition.target] {
                if !machine.has_state(state) {
                    report.add_error(
                        "unknown-state",
                        &transition_location,
                        format!("state `{}` is not declared", state),
                    );
                }
            }

            let trigger = transition.trigger.as_str();
            let known_trigger = doc.operation(trigger).is_some()
                || doc.jobs.iter().any(|j| j.name == trigger)
                || doc.events.iter().any(|e| e.name == trigger);
            if !known_trigger {
                report.add_error(
                    "unknown-trigger",
                    &transition_location,
                    format!("trigger `{}` is not an operation, job or event", trigger),
                );
            }

            if !pairs.insert((transition.source.as_str(), trigger)) {
                report.add_warning(
                    "duplicate-transition",
                    &transition_location,
                    format!(
                        "more than one transition from `{}` on `{}`",
                        transition.source, trigger
                    ),
                );
            }

            for text in transition.preconditions.iter().chain(transition.effects.iter()) {
                Self::check_literals(doc, &mut report, &transition_location, text);
            }
        }

        report
    }

    pub fn validate_rule(doc: &SpecDocument, rule: &Rule) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("Rule {}", rule.name);

        for op in &rule.applies_to {
            Self::check_operation(doc, &mut report, &location, op);
        }
        for tag in &rule.tags {
            if let RuleTag::ExceptionTo(target) = tag {
                if doc.rule(target).is_none() {
                    report.add_error(
                        "unknown-rule",
                        &location,
                        format!("`exception-to` names undeclared rule `{}`", target),
                    );
                }
            }
        }

        let texts = rule
            .clauses
            .iter()
            .flat_map(|c| [&c.when, &c.then])
            .chain(rule.validation.iter())
            .chain(rule.implementation.iter())
            .chain(rule.example.iter());
        for text in texts {
            Self::check_literals(doc, &mut report, &location, text);
        }
        report
    }

    pub fn validate_operation(
        doc: &SpecDocument,
        naming: &NamingRules,
        op: &Operation,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        let location = format!("Operation {}", op.name);

        if !naming.is_pascal_case(&op.name) {
            report.add_warning(
                "naming-convention",
                &location,
                "operation names should be PascalCase",
            );
        }
        if op.endpoint.is_none() {
            report.add_warning("missing-endpoint", &location, "no `Endpoint:` declared");
        }

        let groups = [
            ("path", &op.input.path),
            ("body", &op.input.body),
            ("query", &op.input.query),
            ("header", &op.input.header),
        ];
        for (group, params) in groups {
            for param in params.iter() {
                let param_location = format!("{} / {} param {}", location, group, param.name);
                report.merge(Self::validate_field(doc, naming, &param_location, param));
            }
        }

        for response in op.success.iter().chain(op.failures.iter()) {
            if let Some(ty) = &response.ty {
                if !doc.resolves_type(ty.base_name()) {
                    report.add_error(
                        "unresolved-type",
                        format!("{} / response {}", location, response.status),
                        format!("type `{}` is neither declared nor built in", ty.base_name()),
                    );
                }
            }
        }

        for case in &op.errors {
            let case_location = format!("{} / error {}", location, case.code);
            if !naming.is_upper_snake_case(&case.code) {
                report.add_warning(
                    "naming-convention",
                    &case_location,
                    "error codes should be UPPER_SNAKE_CASE",
                );
            }
            Self::check_literals(doc, &mut report, &case_location, &case.condition);
        }

        for text in op.preconditions.iter().chain(op.effects.iter()) {
            Self::check_literals(doc, &mut report, &location, text);
        }

        Self::check_regions(&mut report, &location, &op.custom);

        for test in &op.tests {
            let test_location = format!("{} / test {}", location, test.name);
            if let Some(invoked) = test.invoked_operation() {
                if doc.operation(invoked).is_none() {
                    report.add_warning(
                        "unknown-test-operation",
                        &test_location,
                        format!("`When:` invokes undeclared operation `{}`", invoked),
                    );
                }
            }
            let texts = test
                .given
                .iter()
                .map(|b| &b.literal)
                .chain(test.when.iter())
                .chain(test.then.iter().flat_map(|a| [&a.subject, &a.expected]));
            for text in texts {
                Self::check_literals(doc, &mut report, &test_location, text);
            }
        }

        report
    }

    fn check_operation(doc: &SpecDocument, report: &mut ValidationReport, location: &str, op: &str) {
        if doc.operation(op).is_none() {
            report.add_error(
                "unknown-operation",
                location,
                format!("operation `{}` is not declared", op),
            );
        }
    }

    /// `Enum.VALUE` literals inside free text must name declared values.
    fn check_literals(doc: &SpecDocument, report: &mut ValidationReport, location: &str, text: &str) {
        for (qualifier, member) in literals::qualified_pairs(text) {
            if let Some(def) = doc.enum_def(&qualifier) {
                if !def.has_value(&member) {
                    report.add_error(
                        "unknown-enum-value",
                        location,
                        format!("`{}.{}` is not a value of enum {}", qualifier, member, def.name),
                    );
                }
            }
        }
    }

    fn check_regions(report: &mut ValidationReport, location: &str, custom: &[CustomImpl]) {
        let mut seen = HashSet::new();
        for region in custom {
            if !seen.insert(region.name.as_str()) {
                report.add_error(
                    "duplicate-region",
                    location,
                    format!("custom region `{}` is declared more than once", region.name),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SpecParser;

    fn validate(text: &str) -> ValidationReport {
        SpecValidator::validate(&SpecParser::parse(text).unwrap())
    }

    fn codes(report: &ValidationReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn test_valid_document() {
        let report = validate(
            "# Schema\nEntity: Widget\n  id: UUID (required)\n\n# Operations\nOperation: GetWidget\n  Endpoint: GET /widgets/{id}\n  Success: 200 Widget\n",
        );
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_unresolved_type_and_reference() {
        let report = validate(
            "# Schema\nEntity: Order\n  owner: Person\n  userId: UUID (references:User.id)\n",
        );
        assert!(!report.valid);
        assert_eq!(codes(&report), vec!["unresolved-type", "unresolved-reference"]);
        assert_eq!(report.issues[0].location, "Entity Order / field owner");
    }

    #[test]
    fn test_enum_literals_are_checked() {
        let report = validate(
            "# Schema\nStatus Enum:\n  OPEN\n\nEntity: Ticket\n  status: Status (default:CLOSED)\n\n# Rules\nRule: R\n  When: ticket.status == Status.DONE\n  Then: reject\n",
        );
        assert_eq!(codes(&report), vec!["unknown-enum-value", "unknown-enum-value"]);
    }

    #[test]
    fn test_state_machine_references() {
        let report = validate(
            "# Schema\nEntity: Ticket\n  id: UUID\n\n# State Machines\nState Machine: Flow\n  Entity: Ticket\n  Initial: Open\n  State: Open\n  Transition: Open -> Closed on CloseTicket\n  Transition: Open -> Open on CloseTicket\n",
        );
        let codes = codes(&report);
        assert!(codes.contains(&"unknown-state"));
        assert!(codes.contains(&"unknown-trigger"));
        assert!(codes.contains(&"duplicate-transition"));
    }

    #[test]
    fn test_naming_violations_are_warnings() {
        let report = validate(
            "# Schema\nEntity: widget\n  Owner_id: UUID\n\n# Operations\nOperation: get_widget\n  Endpoint: GET /w\n  Error: notFound | 404 | missing | gone\n",
        );
        assert!(report.valid);
        assert_eq!(report.warning_count(), 4);
    }

    #[test]
    fn test_required_and_optional_conflict() {
        let report = validate("# Schema\nEntity: A\n  b: Int (required, optional)\n");
        assert_eq!(codes(&report), vec!["conflicting-constraints"]);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let text = "# Schema\nEntity: A\n  b: Nope\n  c: Nada\n\n# Rules\nRule: R\n  Applies To: Missing, Gone\n";
        assert_eq!(validate(text), validate(text));
    }
}
