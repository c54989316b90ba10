//! Applying refactoring metadata to a document.
//!
//! Renames are resolved against tables built from the original document
//! before anything is rewritten, and every name is looked up exactly once.
//! Additions, removals and modifications then apply in that order and refer
//! to elements by their post-rename names.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use crate::error::{DanglingReference, DanglingReferenceError, SpecError, SpecResult};
use crate::grammar;
use crate::literals;
use crate::models::*;

/// Wildcard key in per-entity metadata maps.
pub const WILDCARD: &str = "*";

/// Applies [`RefactoringMetadata`] to documents.
pub struct RefactorApplier;

impl RefactorApplier {
    /// Produce a new document with the metadata applied.
    pub fn apply(doc: &SpecDocument, metadata: &RefactoringMetadata) -> SpecResult<SpecDocument> {
        let mut result = doc.clone();

        if !metadata.renames.is_empty() {
            let table = RenameTable::build(doc, &metadata.renames)?;
            table.apply(&mut result);
            debug!("Applied renames");
        }
        Self::apply_additions(&mut result, &metadata.additions)?;
        Self::apply_removals(&mut result, &metadata.removals)?;
        Self::apply_modifications(&mut result, &metadata.modifications)?;

        info!(
            "Refactored document: {} entities, {} enums, {} operations",
            result.entities.len(),
            result.enums.len(),
            result.operations.len()
        );
        Ok(result)
    }

    /// Apply the metadata attached to a version history entry.
    pub fn apply_version(doc: &SpecDocument, version: &str) -> SpecResult<SpecDocument> {
        let entry = doc
            .version(version)
            .ok_or_else(|| SpecError::VersionNotFound(version.to_string()))?;
        let metadata = entry.refactoring.as_ref().ok_or_else(|| {
            SpecError::InvalidMetadata(format!("version {} carries no refactoring metadata", version))
        })?;
        info!("Applying refactoring metadata from version {}", version);
        Self::apply(doc, metadata)
    }

    fn entity_indices(doc: &SpecDocument, target: &str) -> SpecResult<Vec<usize>> {
        if target == WILDCARD {
            return Ok((0..doc.entities.len()).collect());
        }
        doc.entities
            .iter()
            .position(|e| e.name == target)
            .map(|i| vec![i])
            .ok_or_else(|| unknown("entity", target))
    }

    fn field_from_spec(spec: &FieldSpec) -> SpecResult<Field> {
        let invalid = |err: grammar::GrammarError| {
            SpecError::InvalidMetadata(format!(
                "field `{}`: expected {}, found `{}`",
                spec.name, err.expected, err.found
            ))
        };
        if !grammar::is_identifier(&spec.name) {
            return Err(SpecError::InvalidMetadata(format!("invalid field name `{}`", spec.name)));
        }
        let mut field = Field::new(&spec.name, grammar::parse_type_ref(&spec.ty).map_err(invalid)?);
        field.constraints = parse_constraints(&spec.constraints).map_err(invalid)?;
        field.description = spec.description.clone();
        Ok(field)
    }

    fn apply_additions(doc: &mut SpecDocument, additions: &Additions) -> SpecResult<()> {
        for (target, specs) in &additions.fields {
            let indices = Self::entity_indices(doc, target)?;
            for spec in specs {
                let field = Self::field_from_spec(spec)?;
                for &i in &indices {
                    let entity = &mut doc.entities[i];
                    if entity.field(&field.name).is_some() {
                        return Err(collision("field", format!("{}.{}", entity.name, field.name)));
                    }
                    entity.fields.push(field.clone());
                }
            }
        }

        for (enum_name, values) in &additions.enum_values {
            let def = doc
                .enums
                .iter_mut()
                .find(|e| &e.name == enum_name)
                .ok_or_else(|| unknown("enum", enum_name))?;
            for spec in values {
                if def.has_value(&spec.value) {
                    return Err(collision("enum value", format!("{}.{}", enum_name, spec.value)));
                }
                def.values.push(EnumValue {
                    value: spec.value.clone(),
                    description: spec.description.clone(),
                });
            }
        }
        Ok(())
    }

    fn apply_removals(doc: &mut SpecDocument, removals: &Removals) -> SpecResult<()> {
        if removals.is_empty() {
            return Ok(());
        }
        let mut removed = RemovedNames::default();

        for name in &removals.entities {
            remove_named(&mut doc.entities, |e| &e.name, name, "entity")?;
            removed.types.insert(name.clone());
        }
        for name in &removals.enums {
            remove_named(&mut doc.enums, |e| &e.name, name, "enum")?;
            removed.types.insert(name.clone());
        }
        for name in &removals.custom_types {
            remove_named(&mut doc.custom_types, |t| &t.name, name, "custom type")?;
            removed.types.insert(name.clone());
        }
        for name in &removals.operations {
            remove_named(&mut doc.operations, |o| &o.name, name, "operation")?;
            removed.operations.insert(name.clone());
        }

        for (target, fields) in &removals.fields {
            let indices = Self::entity_indices(doc, target)?;
            for field in fields {
                let mut found = false;
                for &i in &indices {
                    let entity = &mut doc.entities[i];
                    if let Some(pos) = entity.fields.iter().position(|f| &f.name == field) {
                        entity.fields.remove(pos);
                        removed.fields.insert((entity.name.clone(), field.clone()));
                        found = true;
                    }
                }
                if !found {
                    return Err(unknown("field", format!("{}.{}", target, field)));
                }
            }
        }

        for (enum_name, values) in &removals.enum_values {
            let def = doc
                .enums
                .iter_mut()
                .find(|e| &e.name == enum_name)
                .ok_or_else(|| unknown("enum", enum_name))?;
            for value in values {
                remove_named(&mut def.values, |v| &v.value, value, "enum value")?;
                removed.enum_values.insert((enum_name.clone(), value.clone()));
            }
        }

        let mut references = Vec::new();
        for (reference, referrer) in collect_references(doc) {
            if removed.covers(&reference) {
                let dangling = DanglingReference {
                    removed: reference.to_string(),
                    referrer,
                };
                if !references.contains(&dangling) {
                    references.push(dangling);
                }
            }
        }
        if !references.is_empty() {
            debug!("Removal left {} dangling reference(s)", references.len());
            return Err(DanglingReferenceError { references }.into());
        }
        Ok(())
    }

    fn apply_modifications(doc: &mut SpecDocument, modifications: &Modifications) -> SpecResult<()> {
        for (target, patches) in &modifications.fields {
            let indices = Self::entity_indices(doc, target)?;
            for (field_name, patch) in patches {
                let invalid = |err: grammar::GrammarError| {
                    SpecError::InvalidMetadata(format!(
                        "field `{}`: expected {}, found `{}`",
                        field_name, err.expected, err.found
                    ))
                };
                let ty = match &patch.ty {
                    Some(ty) => Some(grammar::parse_type_ref(ty).map_err(invalid)?),
                    None => None,
                };
                let constraints = match &patch.constraints {
                    Some(tokens) => Some(parse_constraints(tokens).map_err(invalid)?),
                    None => None,
                };

                let mut found = false;
                for &i in &indices {
                    let Some(field) = doc.entities[i].fields.iter_mut().find(|f| &f.name == field_name)
                    else {
                        continue;
                    };
                    if let Some(ty) = &ty {
                        field.ty = ty.clone();
                    }
                    if let Some(constraints) = &constraints {
                        field.constraints = constraints.clone();
                    }
                    if let Some(description) = &patch.description {
                        field.description = Some(description.clone());
                    }
                    found = true;
                }
                if !found {
                    return Err(unknown("field", format!("{}.{}", target, field_name)));
                }
            }
        }

        for (enum_name, values) in &modifications.enum_values {
            let def = doc
                .enums
                .iter_mut()
                .find(|e| &e.name == enum_name)
                .ok_or_else(|| unknown("enum", enum_name))?;
            for (value, description) in values {
                let entry = def
                    .values
                    .iter_mut()
                    .find(|v| &v.value == value)
                    .ok_or_else(|| unknown("enum value", format!("{}.{}", enum_name, value)))?;
                entry.description = Some(description.clone());
            }
        }
        Ok(())
    }
}

fn unknown(kind: &str, name: impl Into<String>) -> SpecError {
    SpecError::UnknownTarget {
        kind: kind.to_string(),
        name: name.into(),
    }
}

fn collision(kind: &str, name: impl Into<String>) -> SpecError {
    SpecError::RenameCollision {
        kind: kind.to_string(),
        name: name.into(),
    }
}

fn parse_constraints(tokens: &[String]) -> grammar::GrammarResult<Vec<Constraint>> {
    tokens.iter().map(|t| grammar::parse_constraint(t.trim())).collect()
}

fn remove_named<T>(
    items: &mut Vec<T>,
    name_of: impl Fn(&T) -> &String,
    name: &str,
    kind: &str,
) -> SpecResult<()> {
    let pos = items
        .iter()
        .position(|item| name_of(item) == name)
        .ok_or_else(|| unknown(kind, name))?;
    items.remove(pos);
    Ok(())
}

// ----- Renames -----

struct RenameTable {
    types: HashMap<String, String>,
    operations: HashMap<String, String>,
    /// Field tables keyed by the entity's original name; wildcard entries
    /// are merged in for entities that have the field.
    fields: HashMap<String, HashMap<String, String>>,
    /// Field renames followed by `.field` accesses in free text.
    literal_fields: HashMap<String, String>,
    enum_values: HashMap<String, HashMap<String, String>>,
    enum_names: HashSet<String>,
}

fn to_table(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn check_targets(
    kind: &str,
    table: &BTreeMap<String, String>,
    exists: impl Fn(&str) -> bool,
) -> SpecResult<()> {
    match table.keys().find(|old| !exists(old.as_str())) {
        Some(old) => Err(unknown(kind, old.as_str())),
        None => Ok(()),
    }
}

/// After renaming, every name in `names` must still be unique.
fn check_collisions<'a>(
    kind: &str,
    scope: Option<&str>,
    names: impl Iterator<Item = &'a str>,
    table: &HashMap<String, String>,
) -> SpecResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        let renamed = table.get(name).map(String::as_str).unwrap_or(name);
        if !seen.insert(renamed) {
            return Err(collision(
                kind,
                match scope {
                    Some(scope) => format!("{}.{}", scope, renamed),
                    None => renamed.to_string(),
                },
            ));
        }
    }
    Ok(())
}

impl RenameTable {
    fn build(doc: &SpecDocument, renames: &Renames) -> SpecResult<Self> {
        check_targets("entity", &renames.entities, |n| doc.entity(n).is_some())?;
        check_targets("enum", &renames.enums, |n| doc.enum_def(n).is_some())?;
        check_targets("custom type", &renames.custom_types, |n| doc.custom_type(n).is_some())?;
        check_targets("operation", &renames.operations, |n| doc.operation(n).is_some())?;

        let mut types = to_table(&renames.entities);
        types.extend(to_table(&renames.enums));
        types.extend(to_table(&renames.custom_types));
        let type_names = doc
            .entities
            .iter()
            .map(|e| e.name.as_str())
            .chain(doc.enums.iter().map(|e| e.name.as_str()))
            .chain(doc.custom_types.iter().map(|t| t.name.as_str()));
        check_collisions("type", None, type_names, &types)?;

        let operations = to_table(&renames.operations);
        check_collisions(
            "operation",
            None,
            doc.operations.iter().map(|o| o.name.as_str()),
            &operations,
        )?;

        let wildcard = renames.fields.get(WILDCARD);
        if let Some(wildcard) = wildcard {
            if let Some(old) = wildcard
                .keys()
                .find(|old| !doc.entities.iter().any(|e| e.field(old).is_some()))
            {
                return Err(unknown("field", format!("{}.{}", WILDCARD, old)));
            }
        }
        for (entity_name, table) in renames.fields.iter().filter(|(k, _)| k.as_str() != WILDCARD) {
            let entity = doc
                .entity(entity_name)
                .ok_or_else(|| unknown("entity", entity_name.as_str()))?;
            if let Some(old) = table.keys().find(|old| entity.field(old).is_none()) {
                return Err(unknown("field", format!("{}.{}", entity_name, old)));
            }
        }

        let mut fields: HashMap<String, HashMap<String, String>> = HashMap::new();
        for entity in &doc.entities {
            let mut table = HashMap::new();
            if let Some(wildcard) = wildcard {
                for (old, new) in wildcard {
                    if entity.field(old).is_some() {
                        table.insert(old.clone(), new.clone());
                    }
                }
            }
            if let Some(specific) = renames.fields.get(&entity.name) {
                table.extend(to_table(specific));
            }
            if table.is_empty() {
                continue;
            }
            check_collisions(
                "field",
                Some(&entity.name),
                entity.fields.iter().map(|f| f.name.as_str()),
                &table,
            )?;
            fields.insert(entity.name.clone(), table);
        }

        let mut literal_fields: HashMap<String, String> =
            wildcard.map(to_table).unwrap_or_default();
        for (entity_name, table) in renames.fields.iter().filter(|(k, _)| k.as_str() != WILDCARD) {
            for (old, new) in table {
                // Only follow entity-specific renames in free text when no
                // entity keeps a field under the old name.
                let kept = doc.entities.iter().any(|e| {
                    e.field(old).is_some()
                        && !fields.get(&e.name).is_some_and(|t| t.contains_key(old))
                });
                if !kept {
                    debug!("Following {}.{} -> {} in free text", entity_name, old, new);
                    literal_fields.entry(old.clone()).or_insert_with(|| new.clone());
                }
            }
        }

        let mut enum_values = HashMap::new();
        for (enum_name, table) in &renames.enum_values {
            let def = doc
                .enum_def(enum_name)
                .ok_or_else(|| unknown("enum", enum_name.as_str()))?;
            if let Some(old) = table.keys().find(|old| !def.has_value(old)) {
                return Err(unknown("enum value", format!("{}.{}", enum_name, old)));
            }
            let table = to_table(table);
            check_collisions(
                "enum value",
                Some(enum_name),
                def.values.iter().map(|v| v.value.as_str()),
                &table,
            )?;
            enum_values.insert(enum_name.clone(), table);
        }

        Ok(Self {
            types,
            operations,
            fields,
            literal_fields,
            enum_values,
            enum_names: doc.enums.iter().map(|e| e.name.clone()).collect(),
        })
    }

    fn rename(table: &HashMap<String, String>, name: &mut String) {
        if let Some(new) = table.get(name.as_str()) {
            *name = new.clone();
        }
    }

    fn rename_operations(&self, names: &mut [String]) {
        for name in names {
            Self::rename(&self.operations, name);
        }
    }

    /// Rewrite identifiers in free text in a single pass.
    fn rewrite_text(&self, text: &str) -> String {
        literals::rewrite_identifiers(text, |token| {
            if token.member {
                if let Some(qualifier) = token.qualifier {
                    if self.enum_names.contains(qualifier) {
                        return self
                            .enum_values
                            .get(qualifier)
                            .and_then(|values| values.get(token.ident))
                            .cloned();
                    }
                }
                return self.literal_fields.get(token.ident).cloned();
            }
            if token.call {
                if let Some(new) = self.operations.get(token.ident) {
                    return Some(new.clone());
                }
            }
            self.types
                .get(token.ident)
                .or_else(|| self.operations.get(token.ident))
                .cloned()
        })
    }

    fn rewrite_all(&self, texts: &mut [String]) {
        for text in texts {
            *text = self.rewrite_text(text);
        }
    }

    fn rewrite_opt(&self, text: &mut Option<String>) {
        if let Some(text) = text {
            *text = self.rewrite_text(text);
        }
    }

    /// Rename the type and constraint targets of a field. The field's own
    /// name is left to the caller.
    fn rename_field_refs(&self, field: &mut Field) {
        let enum_name = field.ty.base_name().to_string();
        for constraint in &mut field.constraints {
            match constraint {
                Constraint::References { entity, field: target } => {
                    if let Some(table) = self.fields.get(entity.as_str()) {
                        Self::rename(table, target);
                    }
                    Self::rename(&self.types, entity);
                }
                Constraint::Default(value) if self.enum_names.contains(&enum_name) => {
                    if value.contains('.') {
                        *value = self.rewrite_text(value);
                    } else if let Some(table) = self.enum_values.get(&enum_name) {
                        Self::rename(table, value);
                    }
                }
                Constraint::Conditional(expr) => *expr = self.rewrite_text(expr),
                _ => {}
            }
        }
        if let Some(new) = self.types.get(&enum_name) {
            field.ty.set_base_name(new.clone());
        }
    }

    fn rename_type_ref(&self, ty: &mut TypeRef) {
        if let Some(new) = self.types.get(ty.base_name()) {
            ty.set_base_name(new.clone());
        }
    }

    fn rename_custom(&self, custom: &mut [CustomImpl]) {
        for region in custom {
            self.rewrite_opt(&mut region.contract);
        }
    }

    fn apply(&self, doc: &mut SpecDocument) {
        for entity in &mut doc.entities {
            let table = self.fields.get(&entity.name);
            for field in &mut entity.fields {
                if let Some(table) = table {
                    Self::rename(table, &mut field.name);
                }
                self.rename_field_refs(field);
            }
            self.rewrite_all(&mut entity.constraints);
            self.rename_custom(&mut entity.custom);
            Self::rename(&self.types, &mut entity.name);
        }

        for def in &mut doc.enums {
            if let Some(table) = self.enum_values.get(&def.name) {
                for value in &mut def.values {
                    Self::rename(table, &mut value.value);
                }
            }
            Self::rename(&self.types, &mut def.name);
        }

        for ty in &mut doc.custom_types {
            if let Some(base) = &mut ty.base {
                Self::rename(&self.types, base);
            }
            Self::rename(&self.types, &mut ty.name);
        }

        for machine in &mut doc.state_machines {
            if let Some(entity) = &mut machine.entity {
                Self::rename(&self.types, entity);
            }
            for state in &mut machine.states {
                self.rename_operations(&mut state.allowed);
                self.rename_operations(&mut state.prohibited);
                self.rewrite_opt(&mut state.entry_condition);
            }
            for transition in &mut machine.transitions {
                Self::rename(&self.operations, &mut transition.trigger);
                self.rewrite_all(&mut transition.preconditions);
                self.rewrite_all(&mut transition.effects);
            }
        }

        for rule in &mut doc.rules {
            self.rename_operations(&mut rule.applies_to);
            for clause in &mut rule.clauses {
                clause.when = self.rewrite_text(&clause.when);
                clause.then = self.rewrite_text(&clause.then);
            }
            self.rewrite_opt(&mut rule.validation);
            self.rewrite_opt(&mut rule.implementation);
            self.rewrite_opt(&mut rule.example);
        }

        for op in &mut doc.operations {
            Self::rename(&self.operations, &mut op.name);
            for param in op.input.all_mut() {
                self.rename_field_refs(param);
            }
            for response in op.success.iter_mut().chain(op.failures.iter_mut()) {
                if let Some(ty) = &mut response.ty {
                    self.rename_type_ref(ty);
                }
            }
            self.rewrite_all(&mut op.preconditions);
            self.rewrite_all(&mut op.effects);
            for case in &mut op.errors {
                case.condition = self.rewrite_text(&case.condition);
                case.message = self.rewrite_text(&case.message);
            }
            self.rename_custom(&mut op.custom);
            for test in &mut op.tests {
                for binding in &mut test.given {
                    binding.literal = self.rewrite_text(&binding.literal);
                }
                self.rewrite_opt(&mut test.when);
                for assertion in &mut test.then {
                    assertion.subject = self.rewrite_text(&assertion.subject);
                    assertion.expected = self.rewrite_text(&assertion.expected);
                }
            }
        }

        for event in &mut doc.events {
            self.rewrite_opt(&mut event.trigger);
            self.rewrite_opt(&mut event.payload);
        }
        for job in &mut doc.jobs {
            self.rename_operations(&mut job.invokes);
            self.rewrite_opt(&mut job.behavior);
        }
        for concern in &mut doc.concerns {
            self.rename_operations(&mut concern.scope);
            self.rewrite_opt(&mut concern.behavior);
        }
    }
}

// ----- Reference walk -----

/// A name one element uses to point at another.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    Type(String),
    Field(String, String),
    /// A `Qualifier.member` pair in free text or an enum default.
    Qualified(String, String),
    Operation(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Type(name) | Reference::Operation(name) => write!(f, "{}", name),
            Reference::Field(owner, member) | Reference::Qualified(owner, member) => {
                write!(f, "{}.{}", owner, member)
            }
        }
    }
}

#[derive(Default)]
struct RemovedNames {
    types: HashSet<String>,
    fields: HashSet<(String, String)>,
    enum_values: HashSet<(String, String)>,
    operations: HashSet<String>,
}

impl RemovedNames {
    fn covers(&self, reference: &Reference) -> bool {
        match reference {
            Reference::Type(name) => self.types.contains(name),
            Reference::Operation(name) => self.operations.contains(name),
            Reference::Field(entity, field) => {
                self.types.contains(entity) || self.fields.contains(&(entity.clone(), field.clone()))
            }
            Reference::Qualified(qualifier, member) => {
                self.types.contains(qualifier)
                    || self.enum_values.contains(&(qualifier.clone(), member.clone()))
            }
        }
    }
}

struct ReferenceWalk<'a> {
    doc: &'a SpecDocument,
    found: Vec<(Reference, String)>,
}

impl<'a> ReferenceWalk<'a> {
    fn push(&mut self, reference: Reference, referrer: &str) {
        self.found.push((reference, referrer.to_string()));
    }

    fn text(&mut self, referrer: &str, text: &str) {
        for (qualifier, member) in literals::qualified_pairs(text) {
            self.push(Reference::Qualified(qualifier, member), referrer);
        }
    }

    fn field(&mut self, referrer: &str, field: &Field) {
        let type_name = field.ty.base_name();
        self.push(Reference::Type(type_name.to_string()), referrer);
        for constraint in &field.constraints {
            match constraint {
                Constraint::References { entity, field } => {
                    self.push(Reference::Field(entity.clone(), field.clone()), referrer)
                }
                Constraint::Default(value) => {
                    let is_enum = self.doc.enum_def(type_name).is_some();
                    match value.split_once('.') {
                        Some(_) => self.text(referrer, value),
                        None if is_enum => self.push(
                            Reference::Qualified(type_name.to_string(), value.clone()),
                            referrer,
                        ),
                        None => {}
                    }
                }
                Constraint::Conditional(expr) => self.text(referrer, expr),
                _ => {}
            }
        }
    }

    fn operations(&mut self, referrer: &str, names: &[String]) {
        for name in names {
            self.push(Reference::Operation(name.clone()), referrer);
        }
    }

    fn custom(&mut self, referrer: &str, custom: &[CustomImpl]) {
        for region in custom {
            if let Some(contract) = &region.contract {
                self.text(&format!("{} / custom {}", referrer, region.name), contract);
            }
        }
    }
}

/// Every reference in the document with a description of its referrer.
fn collect_references(doc: &SpecDocument) -> Vec<(Reference, String)> {
    let mut walk = ReferenceWalk {
        doc,
        found: Vec::new(),
    };

    for entity in &doc.entities {
        for field in &entity.fields {
            walk.field(&format!("Entity {} / field {}", entity.name, field.name), field);
        }
        for constraint in &entity.constraints {
            walk.text(&format!("Entity {}", entity.name), constraint);
        }
        walk.custom(&format!("Entity {}", entity.name), &entity.custom);
    }
    for ty in &doc.custom_types {
        if let Some(base) = &ty.base {
            walk.push(Reference::Type(base.clone()), &format!("Type {}", ty.name));
        }
    }
    for machine in &doc.state_machines {
        let referrer = format!("State Machine {}", machine.name);
        if let Some(entity) = &machine.entity {
            walk.push(Reference::Type(entity.clone()), &referrer);
        }
        for state in &machine.states {
            let referrer = format!("{} / state {}", referrer, state.name);
            walk.operations(&referrer, &state.allowed);
            walk.operations(&referrer, &state.prohibited);
            if let Some(entry) = &state.entry_condition {
                walk.text(&referrer, entry);
            }
        }
        for transition in &machine.transitions {
            let referrer = format!(
                "{} / transition {} -> {}",
                referrer, transition.source, transition.target
            );
            walk.push(Reference::Operation(transition.trigger.clone()), &referrer);
            for text in transition.preconditions.iter().chain(transition.effects.iter()) {
                walk.text(&referrer, text);
            }
        }
    }
    for rule in &doc.rules {
        let referrer = format!("Rule {}", rule.name);
        walk.operations(&referrer, &rule.applies_to);
        for clause in &rule.clauses {
            walk.text(&referrer, &clause.when);
            walk.text(&referrer, &clause.then);
        }
        for text in rule
            .validation
            .iter()
            .chain(rule.implementation.iter())
            .chain(rule.example.iter())
        {
            walk.text(&referrer, text);
        }
    }
    for op in &doc.operations {
        let referrer = format!("Operation {}", op.name);
        for param in op.input.all() {
            walk.field(&format!("{} / param {}", referrer, param.name), param);
        }
        for response in op.success.iter().chain(op.failures.iter()) {
            if let Some(ty) = &response.ty {
                walk.push(Reference::Type(ty.base_name().to_string()), &referrer);
            }
        }
        for text in op.preconditions.iter().chain(op.effects.iter()) {
            walk.text(&referrer, text);
        }
        for case in &op.errors {
            walk.text(&referrer, &case.condition);
            walk.text(&referrer, &case.message);
        }
        walk.custom(&referrer, &op.custom);
        for test in &op.tests {
            let referrer = format!("{} / test {}", referrer, test.name);
            if let Some(invoked) = test.invoked_operation() {
                walk.push(Reference::Operation(invoked.to_string()), &referrer);
            }
            for binding in &test.given {
                walk.text(&referrer, &binding.literal);
            }
            if let Some(when) = &test.when {
                walk.text(&referrer, when);
            }
            for assertion in &test.then {
                walk.text(&referrer, &assertion.subject);
                walk.text(&referrer, &assertion.expected);
            }
        }
    }
    for event in &doc.events {
        for text in event.trigger.iter().chain(event.payload.iter()) {
            walk.text(&format!("Event {}", event.name), text);
        }
    }
    for job in &doc.jobs {
        let referrer = format!("Job {}", job.name);
        walk.operations(&referrer, &job.invokes);
        if let Some(behavior) = &job.behavior {
            walk.text(&referrer, behavior);
        }
    }
    for concern in &doc.concerns {
        let referrer = format!("Concern {}", concern.name);
        let scope: Vec<String> = concern.scope.iter().filter(|s| s.as_str() != WILDCARD).cloned().collect();
        walk.operations(&referrer, &scope);
        if let Some(behavior) = &concern.behavior {
            walk.text(&referrer, behavior);
        }
    }

    walk.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SpecParser;

    const DOC: &str = r#"# Schema

Entity: Customer
  id: UUID (required)
  notes: Text (optional)

Entity: Order
  id: UUID (required)
  customerId: UUID (references:Customer.id)
  status: OrderStatus (default:PENDING)
  notes: Text (optional)

OrderStatus Enum:
  PENDING
  SHIPPED

# Rules

Rule: ShipOnlyPaid
  When: order.status == OrderStatus.PENDING
  Then: ShipOrder(order) is rejected
  Applies To: ShipOrder

# Operations

Operation: ShipOrder
  Endpoint: POST /orders/{id}/ship
  Success: 200 Order
  Test: ships
    Given: order = {status: OrderStatus.PENDING}
    When: ShipOrder(order.id)
    Then: order.notes == "shipped"
"#;

    fn doc() -> SpecDocument {
        SpecParser::parse(DOC).unwrap()
    }

    fn metadata(yaml: &str) -> RefactoringMetadata {
        RefactoringMetadata::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_entity_and_operation_renames_follow_references() {
        let meta = metadata("renames:\n  entities: {Customer: Client}\n  operations: {ShipOrder: DispatchOrder}\n");
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();

        assert!(result.entity("Client").is_some());
        let order = result.entity("Order").unwrap();
        assert_eq!(
            order.field("customerId").unwrap().constraints[0],
            Constraint::References {
                entity: "Client".into(),
                field: "id".into()
            }
        );
        assert_eq!(result.rules[0].applies_to, vec!["DispatchOrder".to_string()]);
        assert_eq!(result.rules[0].clauses[0].then, "DispatchOrder(order) is rejected");
        let op = result.operation("DispatchOrder").unwrap();
        assert_eq!(op.tests[0].when.as_deref(), Some("DispatchOrder(order.id)"));
    }

    #[test]
    fn test_swap_does_not_chain() {
        let meta = metadata("renames:\n  enum_values: {OrderStatus: {PENDING: SHIPPED, SHIPPED: PENDING}}\n");
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        let values: Vec<&str> = result.enums[0].values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, vec!["SHIPPED", "PENDING"]);
        assert_eq!(result.rules[0].clauses[0].when, "order.status == OrderStatus.SHIPPED");
        let status = result.entity("Order").unwrap().field("status").unwrap();
        assert_eq!(status.default_value(), Some("SHIPPED"));
    }

    #[test]
    fn test_wildcard_field_rename() {
        let meta = metadata("renames:\n  fields: {\"*\": {notes: remarks}}\n");
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        for entity in &result.entities {
            assert!(entity.field("notes").is_none());
            assert!(entity.field("remarks").is_some());
        }
        let test = &result.operations[0].tests[0];
        assert_eq!(test.then[0].subject, "order.remarks");
        assert_eq!(test.then[0].expected, "\"shipped\"");
    }

    #[test]
    fn test_entity_specific_rename_leaves_literals_when_name_is_kept() {
        let meta = metadata("renames:\n  fields: {Order: {notes: comment}}\n");
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        assert!(result.entity("Order").unwrap().field("comment").is_some());
        assert!(result.entity("Customer").unwrap().field("notes").is_some());
        assert_eq!(result.operations[0].tests[0].then[0].subject, "order.notes");
    }

    #[test]
    fn test_rename_collision() {
        let meta = metadata("renames:\n  entities: {Customer: Order}\n");
        let err = RefactorApplier::apply(&doc(), &meta).unwrap_err();
        assert!(matches!(err, SpecError::RenameCollision { .. }));
    }

    #[test]
    fn test_unknown_rename_target() {
        let meta = metadata("renames:\n  fields: {Order: {missing: present}}\n");
        let err = RefactorApplier::apply(&doc(), &meta).unwrap_err();
        assert!(matches!(err, SpecError::UnknownTarget { .. }));
    }

    #[test]
    fn test_additions_append() {
        let meta = metadata(
            "additions:\n  fields: {Order: [{name: total, type: Money, constraints: [required]}]}\n  enum_values: {OrderStatus: [{value: HELD}]}\n",
        );
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        let order = result.entity("Order").unwrap();
        assert_eq!(order.fields.last().unwrap().name, "total");
        assert!(order.fields.last().unwrap().is_required());
        assert_eq!(result.enums[0].values.last().unwrap().value, "HELD");
    }

    #[test]
    fn test_removal_with_dangling_reference_fails() {
        let meta = metadata("removals:\n  enum_values: {OrderStatus: [PENDING]}\n");
        let err = RefactorApplier::apply(&doc(), &meta).unwrap_err();
        match err {
            SpecError::DanglingReference(err) => {
                let referrers: Vec<&str> = err.references.iter().map(|r| r.referrer.as_str()).collect();
                assert!(referrers.contains(&"Entity Order / field status"));
                assert!(referrers.contains(&"Rule ShipOnlyPaid"));
                assert!(referrers.contains(&"Operation ShipOrder / test ships"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_removal_checks_implementation_messages_and_contracts() {
        let text = r#"# Schema

Entity: Order
  id: UUID (required)
  status: OrderStatus (required)

OrderStatus Enum:
  PENDING
  CLOSED

# Rules

Rule: CloseOnShip
  When: order.status == OrderStatus.PENDING
  Then: order is closed
  Implementation: set order.status = OrderStatus.CLOSED

# Operations

Operation: ShipOrder
  Endpoint: POST /orders/{id}/ship
  Success: 200 Order
  Error: ORDER_CLOSED | 409 | order is finished | Order is already OrderStatus.CLOSED
  Custom: notify (after, contract:notify(order) when OrderStatus.CLOSED)
"#;
        let doc = SpecParser::parse(text).unwrap();
        let meta = metadata("removals:\n  enum_values: {OrderStatus: [CLOSED]}\n");
        match RefactorApplier::apply(&doc, &meta).unwrap_err() {
            SpecError::DanglingReference(err) => {
                let referrers: Vec<&str> = err.references.iter().map(|r| r.referrer.as_str()).collect();
                assert!(referrers.contains(&"Rule CloseOnShip"));
                assert!(referrers.contains(&"Operation ShipOrder"));
                assert!(referrers.contains(&"Operation ShipOrder / custom notify"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The same text fields follow a rename of the value.
        let meta = metadata("renames:\n  enum_values: {OrderStatus: {CLOSED: DONE}}\n");
        let result = RefactorApplier::apply(&doc, &meta).unwrap();
        assert_eq!(
            result.rules[0].implementation.as_deref(),
            Some("set order.status = OrderStatus.DONE")
        );
    }

    #[test]
    fn test_clean_removal() {
        let meta = metadata("removals:\n  fields: {\"*\": [notes]}\n");
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        assert!(result.entities.iter().all(|e| e.field("notes").is_none()));
    }

    #[test]
    fn test_modifications() {
        let meta = metadata(
            "modifications:\n  fields: {Order: {notes: {type: String, description: free text}}}\n  enum_values: {OrderStatus: {SHIPPED: left the warehouse}}\n",
        );
        let result = RefactorApplier::apply(&doc(), &meta).unwrap();
        let notes = result.entity("Order").unwrap().field("notes").unwrap();
        assert_eq!(notes.ty, TypeRef::named("String"));
        assert_eq!(notes.constraints, vec![Constraint::Optional]);
        assert_eq!(notes.description.as_deref(), Some("free text"));
        assert_eq!(
            result.enums[0].values[1].description.as_deref(),
            Some("left the warehouse")
        );
    }

    #[test]
    fn test_apply_unknown_version() {
        let err = RefactorApplier::apply_version(&doc(), "9.9.9").unwrap_err();
        assert!(matches!(err, SpecError::VersionNotFound(_)));
    }
}
