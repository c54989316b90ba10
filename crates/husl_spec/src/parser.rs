//! Specification document parser.
//!
//! Parsing is section-oriented: the outline splits the text on headings,
//! then each structured section dispatches its blocks on a fixed keyword
//! table. Errors are collected across the whole document and returned
//! together.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ParseError, ParseErrors, SpecResult};
use crate::grammar::{self, GrammarError};
use crate::models::*;
use crate::outline::{self, Block, Node, RawSection, SourceLine};

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Parser for specification documents.
pub struct SpecParser;

impl SpecParser {
    /// Parse document text into a [`SpecDocument`].
    pub fn parse(text: &str) -> SpecResult<SpecDocument> {
        let outline = outline::split_sections(text);
        let mut ctx = ParseContext::default();

        let sections: Vec<Section> = outline.sections.iter().map(|raw| ctx.section(raw)).collect();

        if !ctx.errors.is_empty() {
            debug!("Parse failed with {} error(s)", ctx.errors.len());
            return Err(ParseErrors(ctx.errors).into());
        }

        let doc = SpecDocument::from_sections(outline.preamble, sections);
        debug!(
            "Parsed document: {} entities, {} enums, {} operations",
            doc.entities.len(),
            doc.enums.len(),
            doc.operations.len()
        );
        Ok(doc)
    }

    /// Read and parse a document file.
    pub fn parse_file(path: impl AsRef<Path>) -> SpecResult<SpecDocument> {
        let path = path.as_ref();
        debug!("Reading specification from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Split `Key: value`, returning the key, the trimmed value and the value's
/// byte index within `text`.
fn key_value(text: &str) -> Option<(&str, &str, usize)> {
    let colon = text.find(':')?;
    let after = &text[colon + 1..];
    let lead = after.len() - after.trim_start().len();
    Some((text[..colon].trim(), after.trim(), colon + 1 + lead))
}

fn strip_bullet(text: &str) -> (&str, usize) {
    match text.strip_prefix("- ") {
        Some(rest) => (rest.trim_start(), text.len() - rest.trim_start().len()),
        None => (text, 0),
    }
}

fn split_description(value: &str) -> (&str, Option<String>) {
    match value.split_once(" - ") {
        Some((head, tail)) if !tail.trim().is_empty() => (head.trim(), Some(tail.trim().to_string())),
        _ => (value.trim(), None),
    }
}

#[derive(Default)]
struct ParseContext {
    errors: Vec<ParseError>,
}

impl ParseContext {
    fn error(
        &mut self,
        line: &SourceLine<'_>,
        at: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) {
        self.errors.push(ParseError {
            line: line.number,
            column: line.column_of(at),
            offset: line.offset_of(at),
            expected: expected.into(),
            found: found.into(),
        });
    }

    fn grammar_error(&mut self, line: &SourceLine<'_>, base: usize, err: GrammarError) {
        self.error(line, base + err.position, err.expected, err.found);
    }

    fn no_children(&mut self, node: &Node<'_>) {
        for child in &node.children {
            self.error(&child.line, 0, "no nested lines under this entry", child.line.text);
        }
    }

    fn bullet_items(&mut self, node: &Node<'_>) -> Vec<String> {
        let mut items = Vec::new();
        for child in &node.children {
            match child.line.text.strip_prefix('-') {
                Some(item) if !item.trim().is_empty() => items.push(item.trim().to_string()),
                _ => self.error(&child.line, 0, "`- item`", child.line.text),
            }
            self.no_children(child);
        }
        items
    }

    fn text_value(&mut self, line: &SourceLine<'_>, value: &str, at: usize) -> Option<String> {
        if value.is_empty() {
            self.error(line, at, "value", line.text);
            None
        } else {
            Some(value.to_string())
        }
    }

    fn name_value(
        &mut self,
        line: &SourceLine<'_>,
        value: &str,
        at: usize,
        what: &str,
    ) -> Option<String> {
        if grammar::is_identifier(value) {
            Some(value.to_string())
        } else {
            self.error(line, at, what, value);
            None
        }
    }

    /// Parse `<keyword> <Name>` block headers.
    fn keyed_header(&mut self, block: &Block<'_>, keyword: &str) -> Option<String> {
        let header = &block.header;
        match header.text.strip_prefix(keyword) {
            Some(rest) => {
                let at = keyword.len() + (rest.len() - rest.trim_start().len());
                self.name_value(header, rest.trim(), at, "element name")
            }
            None => {
                self.error(header, 0, format!("`{} <Name>` block header", keyword), header.text);
                None
            }
        }
    }

    fn section(&mut self, raw: &RawSection<'_>) -> Section {
        let kind = match SectionKind::from_title(raw.title) {
            Some(kind) => kind,
            None => {
                debug!("Keeping unknown section '{}' as pass-through", raw.title);
                return Section::Opaque(OpaqueSection {
                    title: raw.title.to_string(),
                    body: raw.body_text(),
                });
            }
        };

        if kind == SectionKind::Overview {
            return Section::Overview(raw.body_text());
        }

        let (blocks, orphans) = outline::blocks(&raw.lines);
        for orphan in &orphans {
            self.error(orphan, 0, "block header", orphan.text);
        }

        match kind {
            SectionKind::Schema => {
                Section::Schema(blocks.iter().filter_map(|b| self.schema_item(b)).collect())
            }
            SectionKind::StateMachines => Section::StateMachines(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "State Machine:")?;
                        Some(self.state_machine(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::Rules => Section::Rules(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "Rule:")?;
                        Some(self.rule(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::Operations => Section::Operations(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "Operation:")?;
                        Some(self.operation(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::Events => Section::Events(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "Event:")?;
                        Some(self.event(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::BackgroundJobs => Section::BackgroundJobs(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "Job:")?;
                        Some(self.job(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::Concerns => Section::Concerns(
                blocks
                    .iter()
                    .filter_map(|b| {
                        let name = self.keyed_header(b, "Concern:")?;
                        Some(self.concern(name, &b.body))
                    })
                    .collect(),
            ),
            SectionKind::VersionHistory => Section::VersionHistory(VersionHistory {
                entries: blocks.iter().filter_map(|b| self.version_entry(b)).collect(),
            }),
            SectionKind::Overview | SectionKind::Opaque(_) => unreachable!("handled above"),
        }
    }

    // ----- Schema -----

    fn schema_item(&mut self, block: &Block<'_>) -> Option<SchemaItem> {
        let header = &block.header;
        if header.text.starts_with("Entity:") {
            let name = self.keyed_header(block, "Entity:")?;
            return Some(SchemaItem::Entity(self.entity(name, &block.body)));
        }
        if header.text.starts_with("Type:") {
            let name = self.keyed_header(block, "Type:")?;
            return Some(SchemaItem::CustomType(self.custom_type(name, &block.body)));
        }
        if let Some(name) = header.text.strip_suffix("Enum:") {
            let name = self.name_value(header, name.trim(), 0, "enum name")?;
            return Some(SchemaItem::Enum(self.enum_def(name, &block.body)));
        }
        self.error(
            header,
            0,
            "`Entity: <Name>`, `<Name> Enum:` or `Type: <Name>` block header",
            header.text,
        );
        None
    }

    fn field(&mut self, line: &SourceLine<'_>) -> Option<Field> {
        match grammar::parse_field_line(line.text) {
            Ok(field) => Some(field),
            Err(err) => {
                self.grammar_error(line, 0, err);
                None
            }
        }
    }

    fn custom(&mut self, line: &SourceLine<'_>, value: &str, at: usize) -> Option<CustomImpl> {
        match grammar::parse_custom(value) {
            Ok(custom) => Some(custom),
            Err(err) => {
                self.grammar_error(line, at, err);
                None
            }
        }
    }

    fn entity(&mut self, name: String, body: &[Node<'_>]) -> Entity {
        let mut entity = Entity::new(name);
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Constraints", value, _)) => {
                    if !value.is_empty() {
                        entity.constraints.push(value.to_string());
                    }
                    let items = self.bullet_items(node);
                    entity.constraints.extend(items);
                    continue;
                }
                Some(("State Machine", value, at)) => {
                    entity.state_machine = self.name_value(line, value, at, "state machine name");
                }
                Some(("Custom", value, at)) => {
                    if let Some(custom) = self.custom(line, value, at) {
                        entity.custom.push(custom);
                    }
                }
                _ => {
                    if let Some(field) = self.field(line) {
                        entity.fields.push(field);
                    }
                }
            }
            self.no_children(node);
        }
        entity
    }

    fn enum_def(&mut self, name: String, body: &[Node<'_>]) -> EnumDef {
        let mut def = EnumDef {
            name,
            values: Vec::new(),
        };
        for node in body {
            let line = &node.line;
            let (item, base) = strip_bullet(line.text);
            let (value, description) = match item.split_once(':') {
                Some((value, desc)) => {
                    let desc = desc.trim();
                    (value.trim(), if desc.is_empty() { None } else { Some(desc.to_string()) })
                }
                None => (item.trim(), None),
            };
            if let Some(value) = self.name_value(line, value, base, "enum value") {
                def.values.push(EnumValue { value, description });
            }
            self.no_children(node);
        }
        def
    }

    fn custom_type(&mut self, name: String, body: &[Node<'_>]) -> CustomType {
        let mut ty = CustomType {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            let (key, value, at) = match key_value(line.text) {
                Some(kv) => kv,
                None => {
                    self.error(line, 0, "custom type key", line.text);
                    continue;
                }
            };
            let value = match self.text_value(line, value, at) {
                Some(value) => value,
                None => continue,
            };
            match key {
                "Base" => ty.base = self.name_value(line, &value, at, "base type name"),
                "Min Length" => ty.min_length = Some(value),
                "Max Length" => ty.max_length = Some(value),
                "Allowed" => ty.allowed = Some(value),
                "Forbidden" => ty.forbidden = Some(value),
                "Rule" => ty.rules.push(value),
                "Valid" => ty.valid_examples.push(value),
                "Invalid" => {
                    let (example, reason) = split_description(&value);
                    ty.invalid_examples.push(InvalidExample {
                        value: example.to_string(),
                        reason,
                    });
                }
                _ => self.error(
                    line,
                    0,
                    "custom type key (Base, Min Length, Max Length, Allowed, Forbidden, Rule, Valid, Invalid)",
                    key,
                ),
            }
            self.no_children(node);
        }
        ty
    }

    // ----- State machines -----

    fn state_machine(&mut self, name: String, body: &[Node<'_>]) -> StateMachine {
        let mut machine = StateMachine {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Entity", value, at)) => {
                    machine.entity = self.name_value(line, value, at, "entity name");
                    self.no_children(node);
                }
                Some(("Initial", value, at)) => {
                    machine.initial = self.name_value(line, value, at, "state name");
                    self.no_children(node);
                }
                Some(("State", value, at)) => {
                    if let Some(state) = self.state(node, value, at) {
                        machine.states.push(state);
                    }
                }
                Some(("Transition", value, at)) => {
                    if let Some(transition) = self.transition(node, value, at) {
                        machine.transitions.push(transition);
                    }
                }
                _ => self.error(
                    line,
                    0,
                    "state machine key (Entity, Initial, State, Transition)",
                    line.text,
                ),
            }
        }
        machine
    }

    fn state(&mut self, node: &Node<'_>, value: &str, at: usize) -> Option<State> {
        let line = &node.line;
        let (name, description) = split_description(value);
        let name = self.name_value(line, name, at, "state name")?;
        let mut state = State {
            name,
            description,
            ..Default::default()
        };
        for child in &node.children {
            let child_line = &child.line;
            match key_value(child_line.text) {
                Some(("Entry", value, at)) => {
                    state.entry_condition = self.text_value(child_line, value, at)
                }
                Some(("Allowed", value, _)) => state.allowed = grammar::parse_name_list(value),
                Some(("Prohibited", value, _)) => {
                    state.prohibited = grammar::parse_name_list(value)
                }
                _ => self.error(
                    child_line,
                    0,
                    "state key (Entry, Allowed, Prohibited)",
                    child_line.text,
                ),
            }
            self.no_children(child);
        }
        Some(state)
    }

    fn transition(&mut self, node: &Node<'_>, value: &str, at: usize) -> Option<Transition> {
        let line = &node.line;
        let parsed = value.split_once("->").and_then(|(source, rest)| {
            let (target, trigger) = rest.split_once(" on ")?;
            Some((source.trim(), target.trim(), trigger.trim()))
        });
        let (source, target, trigger) = match parsed {
            Some(parts)
                if grammar::is_identifier(parts.0)
                    && grammar::is_identifier(parts.1)
                    && grammar::is_identifier(parts.2) =>
            {
                parts
            }
            _ => {
                self.error(line, at, "`Source -> Target on Trigger`", value);
                return None;
            }
        };

        let mut transition = Transition {
            source: source.to_string(),
            target: target.to_string(),
            trigger: trigger.to_string(),
            preconditions: Vec::new(),
            effects: Vec::new(),
        };
        for child in &node.children {
            let child_line = &child.line;
            match key_value(child_line.text) {
                Some(("Precondition", value, at)) => {
                    if let Some(text) = self.text_value(child_line, value, at) {
                        transition.preconditions.push(text);
                    }
                }
                Some(("Effect", value, at)) => {
                    if let Some(text) = self.text_value(child_line, value, at) {
                        transition.effects.push(text);
                    }
                }
                _ => self.error(
                    child_line,
                    0,
                    "transition key (Precondition, Effect)",
                    child_line.text,
                ),
            }
            self.no_children(child);
        }
        Some(transition)
    }

    // ----- Rules -----

    fn rule(&mut self, name: String, body: &[Node<'_>]) -> Rule {
        let mut rule = Rule {
            name,
            ..Default::default()
        };
        let mut pending_when: Option<(String, SourceLine<'_>)> = None;

        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Category", value, at)) => rule.category = self.text_value(line, value, at),
                Some(("Description", value, at)) => {
                    rule.description = self.text_value(line, value, at)
                }
                Some(("When", value, at)) => {
                    if let Some((_, previous)) = pending_when.take() {
                        self.error(&previous, 0, "`Then:` after `When:`", previous.text);
                    }
                    pending_when = self.text_value(line, value, at).map(|when| (when, *line));
                }
                Some(("Then", value, at)) => match pending_when.take() {
                    Some((when, _)) => {
                        if let Some(then) = self.text_value(line, value, at) {
                            rule.clauses.push(RuleClause { when, then });
                        }
                    }
                    None => self.error(line, 0, "`When:` before `Then:`", line.text),
                },
                Some(("Validation", value, at)) => {
                    rule.validation = self.text_value(line, value, at)
                }
                Some(("Implementation", value, at)) => {
                    rule.implementation = self.text_value(line, value, at)
                }
                Some(("Example", value, at)) => rule.example = self.text_value(line, value, at),
                Some(("Applies To", value, _)) => rule.applies_to = grammar::parse_name_list(value),
                Some(("Tags", value, at)) => match grammar::split_top_level(value, ',') {
                    Ok(tokens) => {
                        for (start, token) in tokens {
                            match grammar::parse_rule_tag(token) {
                                Ok(tag) => rule.tags.push(tag),
                                Err(err) => self.grammar_error(line, at + start, err),
                            }
                        }
                    }
                    Err(err) => self.grammar_error(line, at, err),
                },
                _ => self.error(
                    line,
                    0,
                    "rule key (Category, Description, When, Then, Validation, Implementation, Example, Applies To, Tags)",
                    line.text,
                ),
            }
            self.no_children(node);
        }

        if let Some((_, line)) = pending_when {
            self.error(&line, 0, "`Then:` after `When:`", line.text);
        }
        rule
    }

    // ----- Operations -----

    fn operation(&mut self, name: String, body: &[Node<'_>]) -> Operation {
        let mut op = Operation {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Endpoint", value, at)) => {
                    op.endpoint = self.endpoint(line, value, at);
                    self.no_children(node);
                }
                Some(("Input", value, at)) => {
                    if !value.is_empty() {
                        self.error(line, at, "parameter groups on the following lines", value);
                    }
                    self.input(node, &mut op.input);
                }
                Some(("Success", value, at)) => {
                    if let Some(response) = self.response(line, value, at) {
                        op.success.push(response);
                    }
                    self.no_children(node);
                }
                Some(("Failure", value, at)) => {
                    if let Some(response) = self.response(line, value, at) {
                        op.failures.push(response);
                    }
                    self.no_children(node);
                }
                Some(("Preconditions", value, _)) => {
                    if !value.is_empty() {
                        op.preconditions.push(value.to_string());
                    }
                    let items = self.bullet_items(node);
                    op.preconditions.extend(items);
                }
                Some(("Effects", value, _)) => {
                    if !value.is_empty() {
                        op.effects.push(value.to_string());
                    }
                    let items = self.bullet_items(node);
                    op.effects.extend(items);
                }
                Some(("Error", value, at)) => {
                    if let Some(case) = self.error_case(line, value, at) {
                        op.errors.push(case);
                    }
                    self.no_children(node);
                }
                Some(("SLA", value, at)) => {
                    if let Some(text) = self.text_value(line, value, at) {
                        op.sla.push(text);
                    }
                    self.no_children(node);
                }
                Some(("Custom", value, at)) => {
                    if let Some(custom) = self.custom(line, value, at) {
                        op.custom.push(custom);
                    }
                    self.no_children(node);
                }
                Some(("Test", value, at)) => {
                    if let Some(test) = self.test_case(node, value, at) {
                        op.tests.push(test);
                    }
                }
                _ => self.error(
                    line,
                    0,
                    "operation key (Endpoint, Input, Success, Failure, Preconditions, Effects, Error, SLA, Custom, Test)",
                    line.text,
                ),
            }
        }
        op
    }

    fn endpoint(&mut self, line: &SourceLine<'_>, value: &str, at: usize) -> Option<Endpoint> {
        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), None)
                if HTTP_METHODS.contains(&method) && path.starts_with('/') =>
            {
                Some(Endpoint {
                    method: method.to_string(),
                    path: path.to_string(),
                })
            }
            _ => {
                self.error(line, at, "`METHOD /path/{param}`", value);
                None
            }
        }
    }

    fn input(&mut self, node: &Node<'_>, input: &mut InputShape) {
        for group in &node.children {
            let line = &group.line;
            let target = match key_value(line.text) {
                Some(("Path", "", _)) => &mut input.path,
                Some(("Body", "", _)) => &mut input.body,
                Some(("Query", "", _)) => &mut input.query,
                Some(("Header", "", _)) => &mut input.header,
                _ => {
                    self.error(line, 0, "input group (Path:, Body:, Query:, Header:)", line.text);
                    continue;
                }
            };
            for param in &group.children {
                match grammar::parse_field_line(param.line.text) {
                    Ok(field) => target.push(field),
                    Err(err) => self.grammar_error(&param.line, 0, err),
                }
                self.no_children(param);
            }
        }
    }

    fn response(&mut self, line: &SourceLine<'_>, value: &str, at: usize) -> Option<ResponseShape> {
        let mut parts = value.split_whitespace();
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|s| (100..=599).contains(s));
        let status = match status {
            Some(status) => status,
            None => {
                self.error(line, at, "HTTP status code", value);
                return None;
            }
        };
        let ty = match (parts.next(), parts.next()) {
            (None, _) => None,
            (Some(ty), None) => match grammar::parse_type_ref(ty) {
                Ok(ty) => Some(ty),
                Err(err) => {
                    let base = at + value.find(ty).unwrap_or(0);
                    self.grammar_error(line, base, err);
                    return None;
                }
            },
            (Some(_), Some(extra)) => {
                self.error(line, at, "`<status> [Type]`", extra);
                return None;
            }
        };
        Some(ResponseShape { status, ty })
    }

    fn error_case(&mut self, line: &SourceLine<'_>, value: &str, at: usize) -> Option<ErrorCase> {
        let parts: Vec<&str> = value.split('|').map(str::trim).collect();
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            self.error(line, at, "`CODE | status | condition | message`", value);
            return None;
        }
        let status = match parts[1].parse::<u16>() {
            Ok(status) => status,
            Err(_) => {
                self.error(line, at, "numeric status in error case", parts[1]);
                return None;
            }
        };
        if !grammar::is_identifier(parts[0]) {
            self.error(line, at, "error code", parts[0]);
            return None;
        }
        Some(ErrorCase {
            code: parts[0].to_string(),
            status,
            condition: parts[2].to_string(),
            message: parts[3].to_string(),
        })
    }

    fn test_case(&mut self, node: &Node<'_>, value: &str, at: usize) -> Option<TestCase> {
        let name = self.name_value(&node.line, value, at, "test name")?;
        let mut test = TestCase {
            name,
            ..Default::default()
        };
        for child in &node.children {
            let line = &child.line;
            match key_value(line.text) {
                Some(("Given", value, at)) => match value.split_once('=') {
                    Some((binding, literal))
                        if grammar::is_identifier(binding.trim()) && !literal.trim().is_empty() =>
                    {
                        test.given.push(Binding {
                            name: binding.trim().to_string(),
                            literal: literal.trim().to_string(),
                        });
                    }
                    _ => self.error(line, at, "`name = literal` binding", value),
                },
                Some(("When", value, at)) => test.when = self.text_value(line, value, at),
                Some(("Then", value, at)) => match grammar::parse_assertion(value) {
                    Ok(assertion) => test.then.push(assertion),
                    Err(err) => self.grammar_error(line, at, err),
                },
                _ => self.error(line, 0, "test key (Given, When, Then)", line.text),
            }
            self.no_children(child);
        }
        Some(test)
    }

    // ----- Events, jobs, concerns -----

    fn event(&mut self, name: String, body: &[Node<'_>]) -> Event {
        let mut event = Event {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Trigger", value, at)) => event.trigger = self.text_value(line, value, at),
                Some(("Payload", value, at)) => event.payload = self.text_value(line, value, at),
                Some(("Description", value, at)) => {
                    event.description = self.text_value(line, value, at)
                }
                _ => self.error(line, 0, "event key (Trigger, Payload, Description)", line.text),
            }
            self.no_children(node);
        }
        event
    }

    fn job(&mut self, name: String, body: &[Node<'_>]) -> BackgroundJob {
        let mut job = BackgroundJob {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Schedule", value, at)) => job.schedule = self.text_value(line, value, at),
                Some(("Invokes", value, _)) => job.invokes = grammar::parse_name_list(value),
                Some(("Behavior", value, at)) => job.behavior = self.text_value(line, value, at),
                _ => self.error(line, 0, "job key (Schedule, Invokes, Behavior)", line.text),
            }
            self.no_children(node);
        }
        job
    }

    fn concern(&mut self, name: String, body: &[Node<'_>]) -> CrossCuttingConcern {
        let mut concern = CrossCuttingConcern {
            name,
            ..Default::default()
        };
        for node in body {
            let line = &node.line;
            match key_value(line.text) {
                Some(("Scope", value, _)) => concern.scope = grammar::parse_name_list(value),
                Some(("Behavior", value, at)) => {
                    concern.behavior = self.text_value(line, value, at)
                }
                _ => self.error(line, 0, "concern key (Scope, Behavior)", line.text),
            }
            self.no_children(node);
        }
        concern
    }

    // ----- Version history -----

    fn version_entry(&mut self, block: &Block<'_>) -> Option<VersionEntry> {
        let header = &block.header;
        let rest = match header.text.strip_prefix("Version:") {
            Some(rest) => rest.trim(),
            None => {
                self.error(header, 0, "`Version: x.y.z (change-type)` block header", header.text);
                return None;
            }
        };
        let (version_text, change_type) = match rest.find('(') {
            Some(open) => {
                let change = rest[open + 1..].strip_suffix(')').map(str::trim);
                match change {
                    Some(change) if !change.is_empty() => {
                        (rest[..open].trim(), Some(change.to_string()))
                    }
                    _ => {
                        self.error(header, 0, "`(change-type)`", rest);
                        return None;
                    }
                }
            }
            None => (rest, None),
        };
        let version = match SemVer::parse(version_text) {
            Some(version) => version,
            None => {
                self.error(header, "Version:".len(), "semantic version x.y.z", version_text);
                return None;
            }
        };

        let mut entry = VersionEntry {
            version,
            change_type,
            changes: Vec::new(),
            refactoring: None,
        };
        for node in &block.body {
            let line = &node.line;
            if let Some(change) = line.text.strip_prefix('-') {
                entry.changes.push(change.trim().to_string());
                self.no_children(node);
                continue;
            }
            match key_value(line.text) {
                Some(("Changes", "", _)) => {
                    let items = self.bullet_items(node);
                    entry.changes.extend(items);
                }
                Some(("Refactoring", "", _)) => {
                    entry.refactoring = self.refactoring(node);
                }
                _ => self.error(line, 0, "`- change`, `Changes:` or `Refactoring:`", line.text),
            }
        }
        Some(entry)
    }

    fn refactoring(&mut self, node: &Node<'_>) -> Option<RefactoringMetadata> {
        let lines = node.descendant_lines();
        if lines.is_empty() {
            self.error(&node.line, 0, "refactoring metadata on the following lines", node.line.text);
            return None;
        }
        let yaml = outline::dedent(&lines);
        match serde_yaml::from_str::<RefactoringMetadata>(&yaml) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                let line = err
                    .location()
                    .and_then(|loc| lines.get(loc.line().saturating_sub(1)))
                    .copied()
                    .unwrap_or(node.line);
                self.error(&line, 0, "refactoring metadata (YAML)", err.to_string());
                None
            }
        }
    }
}
