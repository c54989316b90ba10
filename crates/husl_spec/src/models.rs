//! Data models for specification documents.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SpecResult;

/// Built-in scalar types every document may reference without declaring them.
pub const BUILTIN_TYPES: &[&str] = &[
    "String", "Text", "Int", "Integer", "Long", "Float", "Double", "Decimal", "Boolean", "Bool",
    "UUID", "Date", "DateTime", "Timestamp", "Time", "Duration", "Email", "URL", "Json", "Binary",
    "Money",
];

/// Check if a type name is one of the built-in types.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// The parsed root of a specification document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDocument {
    /// Text before the first section heading.
    pub preamble: String,
    pub overview: Option<String>,
    pub entities: Vec<Entity>,
    pub enums: Vec<EnumDef>,
    pub custom_types: Vec<CustomType>,
    pub state_machines: Vec<StateMachine>,
    pub rules: Vec<Rule>,
    pub operations: Vec<Operation>,
    pub events: Vec<Event>,
    pub jobs: Vec<BackgroundJob>,
    pub concerns: Vec<CrossCuttingConcern>,
    pub version_history: VersionHistory,
    /// Unknown top-level sections, kept verbatim.
    pub extra_sections: Vec<OpaqueSection>,
    /// Order in which sections appeared, used when writing the document back.
    pub layout: Vec<SectionKind>,
}

/// One top-level section as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Overview(String),
    Schema(Vec<SchemaItem>),
    StateMachines(Vec<StateMachine>),
    Rules(Vec<Rule>),
    Operations(Vec<Operation>),
    Events(Vec<Event>),
    BackgroundJobs(Vec<BackgroundJob>),
    Concerns(Vec<CrossCuttingConcern>),
    VersionHistory(VersionHistory),
    Opaque(OpaqueSection),
}

/// A block inside the Schema section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaItem {
    Entity(Entity),
    Enum(EnumDef),
    CustomType(CustomType),
}

/// Section kinds in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Overview,
    Schema,
    StateMachines,
    Rules,
    Operations,
    Events,
    BackgroundJobs,
    Concerns,
    VersionHistory,
    /// Index into `SpecDocument::extra_sections`.
    Opaque(usize),
}

impl SectionKind {
    /// Canonical heading text for a structured section.
    pub fn title(&self) -> Option<&'static str> {
        match self {
            SectionKind::Overview => Some("Overview"),
            SectionKind::Schema => Some("Schema"),
            SectionKind::StateMachines => Some("State Machines"),
            SectionKind::Rules => Some("Rules"),
            SectionKind::Operations => Some("Operations"),
            SectionKind::Events => Some("Events"),
            SectionKind::BackgroundJobs => Some("Background Jobs"),
            SectionKind::Concerns => Some("Cross-Cutting Concerns"),
            SectionKind::VersionHistory => Some("Version History"),
            SectionKind::Opaque(_) => None,
        }
    }

    /// Look up a structured section kind from heading text.
    pub fn from_title(title: &str) -> Option<Self> {
        match title.trim().to_lowercase().as_str() {
            "overview" => Some(SectionKind::Overview),
            "schema" => Some(SectionKind::Schema),
            "state machines" => Some(SectionKind::StateMachines),
            "rules" | "business rules" => Some(SectionKind::Rules),
            "operations" => Some(SectionKind::Operations),
            "events" => Some(SectionKind::Events),
            "background jobs" => Some(SectionKind::BackgroundJobs),
            "cross-cutting concerns" => Some(SectionKind::Concerns),
            "version history" => Some(SectionKind::VersionHistory),
            _ => None,
        }
    }
}

impl SpecDocument {
    /// Assemble a document from parsed sections. Repeated sections of the
    /// same kind are concatenated in order.
    pub fn from_sections(preamble: impl Into<String>, sections: Vec<Section>) -> Self {
        let mut doc = SpecDocument {
            preamble: preamble.into(),
            ..Default::default()
        };

        for section in sections {
            let kind = match section {
                Section::Overview(text) => {
                    doc.overview = Some(match doc.overview.take() {
                        Some(existing) => format!("{}\n\n{}", existing, text),
                        None => text,
                    });
                    SectionKind::Overview
                }
                Section::Schema(items) => {
                    for item in items {
                        match item {
                            SchemaItem::Entity(entity) => doc.entities.push(entity),
                            SchemaItem::Enum(def) => doc.enums.push(def),
                            SchemaItem::CustomType(ty) => doc.custom_types.push(ty),
                        }
                    }
                    SectionKind::Schema
                }
                Section::StateMachines(machines) => {
                    doc.state_machines.extend(machines);
                    SectionKind::StateMachines
                }
                Section::Rules(rules) => {
                    doc.rules.extend(rules);
                    SectionKind::Rules
                }
                Section::Operations(operations) => {
                    doc.operations.extend(operations);
                    SectionKind::Operations
                }
                Section::Events(events) => {
                    doc.events.extend(events);
                    SectionKind::Events
                }
                Section::BackgroundJobs(jobs) => {
                    doc.jobs.extend(jobs);
                    SectionKind::BackgroundJobs
                }
                Section::Concerns(concerns) => {
                    doc.concerns.extend(concerns);
                    SectionKind::Concerns
                }
                Section::VersionHistory(history) => {
                    doc.version_history.entries.extend(history.entries);
                    SectionKind::VersionHistory
                }
                Section::Opaque(section) => {
                    doc.extra_sections.push(section);
                    SectionKind::Opaque(doc.extra_sections.len() - 1)
                }
            };
            if !doc.layout.contains(&kind) {
                doc.layout.push(kind);
            }
        }

        doc
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn custom_type(&self, name: &str) -> Option<&CustomType> {
        self.custom_types.iter().find(|t| t.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn state_machine(&self, name: &str) -> Option<&StateMachine> {
        self.state_machines.iter().find(|m| m.name == name)
    }

    /// Check whether a name resolves to a declared schema element or a built-in type.
    pub fn resolves_type(&self, name: &str) -> bool {
        is_builtin_type(name)
            || self.entity(name).is_some()
            || self.enum_def(name).is_some()
            || self.custom_type(name).is_some()
    }

    /// Rules whose `Applies To` list names the given operation.
    pub fn rules_for<'a>(&'a self, operation: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.applies_to.iter().any(|op| op == operation))
    }

    /// Concerns whose scope covers the given operation.
    pub fn concerns_for<'a>(
        &'a self,
        operation: &'a str,
    ) -> impl Iterator<Item = &'a CrossCuttingConcern> + 'a {
        self.concerns
            .iter()
            .filter(move |c| c.scope.iter().any(|s| s == "*" || s == operation))
    }

    /// Find a version entry by its semantic version string.
    pub fn version(&self, version: &str) -> Option<&VersionEntry> {
        self.version_history
            .entries
            .iter()
            .find(|entry| entry.version.to_string() == version)
    }

    /// Serialize the model to pretty JSON.
    pub fn to_json(&self) -> SpecResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A reference to a type, optionally wrapped in a list-of modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// The innermost referenced type name.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) => inner.base_name(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, TypeRef::List(_))
    }

    /// Rename the innermost type name in place.
    pub fn set_base_name(&mut self, name: impl Into<String>) {
        match self {
            TypeRef::Named(existing) => *existing = name.into(),
            TypeRef::List(inner) => inner.set_base_name(name),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "List<{}>", inner),
        }
    }
}

/// A field constraint from the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Required,
    Optional,
    Immutable,
    SystemGenerated,
    Default(String),
    /// Numeric lower bound, kept as written.
    Min(String),
    /// Numeric upper bound, kept as written.
    Max(String),
    References { entity: String, field: String },
    Format(String),
    Conditional(String),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Required => write!(f, "required"),
            Constraint::Optional => write!(f, "optional"),
            Constraint::Immutable => write!(f, "immutable"),
            Constraint::SystemGenerated => write!(f, "system-generated"),
            Constraint::Default(value) => write!(f, "default:{}", value),
            Constraint::Min(value) => write!(f, "min:{}", value),
            Constraint::Max(value) => write!(f, "max:{}", value),
            Constraint::References { entity, field } => write!(f, "references:{}.{}", entity, field),
            Constraint::Format(value) => write!(f, "format:{}", value),
            Constraint::Conditional(expr) => write!(f, "conditional:{}", expr),
        }
    }
}

/// A typed field of an entity or an operation parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub constraints: Vec<Constraint>,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            constraints: Vec::new(),
            description: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_required(&self) -> bool {
        self.constraints.contains(&Constraint::Required)
    }

    pub fn is_optional(&self) -> bool {
        self.constraints.contains(&Constraint::Optional)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Default(value) => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Where a custom implementation region hooks into generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    Before,
    After,
    Replace,
    Extend,
}

impl HookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::Before => "before",
            HookType::After => "after",
            HookType::Replace => "replace",
            HookType::Extend => "extend",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "before" => Some(HookType::Before),
            "after" => Some(HookType::After),
            "replace" => Some(HookType::Replace),
            "extend" => Some(HookType::Extend),
            _ => None,
        }
    }

    pub fn all() -> [HookType; 4] {
        [HookType::Before, HookType::After, HookType::Replace, HookType::Extend]
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `Custom:` entry declaring a protected region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomImpl {
    pub name: String,
    pub hook: HookType,
    pub contract: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub fields: Vec<Field>,
    pub constraints: Vec<String>,
    pub state_machine: Option<String>,
    pub custom: Vec<CustomImpl>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            constraints: Vec::new(),
            state_machine: None,
            custom: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<EnumValue>,
}

impl EnumDef {
    pub fn has_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidExample {
    pub value: String,
    pub reason: Option<String>,
}

/// A constrained scalar type. Constraint text is stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomType {
    pub name: String,
    pub base: Option<String>,
    pub min_length: Option<String>,
    pub max_length: Option<String>,
    pub allowed: Option<String>,
    pub forbidden: Option<String>,
    pub rules: Vec<String>,
    pub valid_examples: Vec<String>,
    pub invalid_examples: Vec<InvalidExample>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub description: Option<String>,
    pub entry_condition: Option<String>,
    pub allowed: Vec<String>,
    pub prohibited: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub target: String,
    /// Name of the operation, job or event that triggers the transition.
    pub trigger: String,
    pub preconditions: Vec<String>,
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachine {
    pub name: String,
    pub entity: Option<String>,
    pub initial: Option<String>,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
}

impl StateMachine {
    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleClause {
    pub when: String,
    pub then: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTag {
    Critical,
    ExceptionTo(String),
    Reasoning(String),
    Status(String),
    Todo(String),
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTag::Critical => write!(f, "critical"),
            RuleTag::ExceptionTo(rule) => write!(f, "exception-to:{}", rule),
            RuleTag::Reasoning(text) => write!(f, "reasoning:{}", text),
            RuleTag::Status(text) => write!(f, "status:{}", text),
            RuleTag::Todo(text) => write!(f, "todo:{}", text),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub clauses: Vec<RuleClause>,
    pub validation: Option<String>,
    pub implementation: Option<String>,
    pub example: Option<String>,
    /// Operations this rule is embedded into.
    pub applies_to: Vec<String>,
    pub tags: Vec<RuleTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub path: Vec<Field>,
    pub body: Vec<Field>,
    pub query: Vec<Field>,
    pub header: Vec<Field>,
}

impl InputShape {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.body.is_empty() && self.query.is_empty() && self.header.is_empty()
    }

    /// All parameters in path, body, query, header order.
    pub fn all(&self) -> impl Iterator<Item = &Field> {
        self.path
            .iter()
            .chain(self.body.iter())
            .chain(self.query.iter())
            .chain(self.header.iter())
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.path
            .iter_mut()
            .chain(self.body.iter_mut())
            .chain(self.query.iter_mut())
            .chain(self.header.iter_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseShape {
    pub status: u16,
    pub ty: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCase {
    /// Machine code, UPPER_SNAKE_CASE by convention.
    pub code: String,
    pub status: u16,
    pub condition: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub literal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    Contains,
    Matches,
    Is,
}

impl AssertOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssertOp::Eq => "==",
            AssertOp::Ne => "!=",
            AssertOp::Ge => ">=",
            AssertOp::Le => "<=",
            AssertOp::Gt => ">",
            AssertOp::Lt => "<",
            AssertOp::Contains => "contains",
            AssertOp::Matches => "matches",
            AssertOp::Is => "is",
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            AssertOp::Eq => "eq",
            AssertOp::Ne => "ne",
            AssertOp::Ge => "ge",
            AssertOp::Le => "le",
            AssertOp::Gt => "gt",
            AssertOp::Lt => "lt",
            AssertOp::Contains => "contains",
            AssertOp::Matches => "matches",
            AssertOp::Is => "is",
        }
    }
}

/// A `Then:` assertion: subject, operator, expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub subject: String,
    pub operator: AssertOp,
    pub expected: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub given: Vec<Binding>,
    pub when: Option<String>,
    pub then: Vec<Assertion>,
}

impl TestCase {
    /// Name of the operation invoked by the `When:` expression, if any.
    pub fn invoked_operation(&self) -> Option<&str> {
        let when = self.when.as_deref()?.trim();
        let end = when.find('(').unwrap_or(when.len());
        let name = when[..end].trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub endpoint: Option<Endpoint>,
    pub input: InputShape,
    pub success: Vec<ResponseShape>,
    pub failures: Vec<ResponseShape>,
    pub preconditions: Vec<String>,
    pub effects: Vec<String>,
    pub errors: Vec<ErrorCase>,
    pub sla: Vec<String>,
    pub custom: Vec<CustomImpl>,
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub trigger: Option<String>,
    pub payload: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub name: String,
    pub schedule: Option<String>,
    /// Operations the job invokes.
    pub invokes: Vec<String>,
    pub behavior: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossCuttingConcern {
    pub name: String,
    /// Operation names, or `*` for every operation.
    pub scope: Vec<String>,
    pub behavior: Option<String>,
}

/// An unknown top-level section kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueSection {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: SemVer,
    pub change_type: Option<String>,
    pub changes: Vec<String>,
    pub refactoring: Option<RefactoringMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub entries: Vec<VersionEntry>,
}

/// Machine-readable refactoring instructions attached to a version entry.
///
/// Keys of the per-entity maps may be `"*"`, meaning every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefactoringMetadata {
    #[serde(skip_serializing_if = "Renames::is_empty")]
    pub renames: Renames,
    #[serde(skip_serializing_if = "Additions::is_empty")]
    pub additions: Additions,
    #[serde(skip_serializing_if = "Removals::is_empty")]
    pub removals: Removals,
    #[serde(skip_serializing_if = "Modifications::is_empty")]
    pub modifications: Modifications,
}

impl RefactoringMetadata {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
            && self.additions.is_empty()
            && self.removals.is_empty()
            && self.modifications.is_empty()
    }

    /// Parse metadata from YAML (JSON is accepted as a YAML subset).
    pub fn from_yaml(text: &str) -> SpecResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Renames {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_types: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub operations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_values: BTreeMap<String, BTreeMap<String, String>>,
}

impl Renames {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.enums.is_empty()
            && self.custom_types.is_empty()
            && self.operations.is_empty()
            && self.fields.is_empty()
            && self.enum_values.is_empty()
    }
}

/// A field to append, with type and constraints in document syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValueSpec {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Additions {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<FieldSpec>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_values: BTreeMap<String, Vec<EnumValueSpec>>,
}

impl Additions {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.enum_values.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Removals {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_values: BTreeMap<String, Vec<String>>,
}

impl Removals {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.enums.is_empty()
            && self.custom_types.is_empty()
            && self.operations.is_empty()
            && self.fields.is_empty()
            && self.enum_values.is_empty()
    }
}

/// Replacement values for an existing field. Unset members are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Modifications {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, BTreeMap<String, FieldPatch>>,
    /// New descriptions keyed by enum, then value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_values: BTreeMap<String, BTreeMap<String, String>>,
}

impl Modifications {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.enum_values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_display_and_base() {
        let ty = TypeRef::List(Box::new(TypeRef::named("Widget")));
        assert_eq!(ty.to_string(), "List<Widget>");
        assert_eq!(ty.base_name(), "Widget");
        assert!(ty.is_list());
    }

    #[test]
    fn test_semver_parse() {
        let v = SemVer::parse("1.12.3").unwrap();
        assert_eq!(v.to_string(), "1.12.3");
        assert!(SemVer::parse("1.2").is_none());
        assert!(SemVer::parse("1.2.3.4").is_none());
    }

    #[test]
    fn test_from_sections_merges_repeated_sections() {
        let doc = SpecDocument::from_sections(
            "",
            vec![
                Section::Schema(vec![SchemaItem::Entity(Entity::new("A"))]),
                Section::Schema(vec![SchemaItem::Entity(Entity::new("B"))]),
            ],
        );
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.layout, vec![SectionKind::Schema]);
    }

    #[test]
    fn test_invoked_operation() {
        let test = TestCase {
            name: "t".into(),
            when: Some("GetWidget(widget.id)".into()),
            ..Default::default()
        };
        assert_eq!(test.invoked_operation(), Some("GetWidget"));
    }

    #[test]
    fn test_metadata_from_yaml_wildcard() {
        let meta = RefactoringMetadata::from_yaml("renames:\n  fields: {\"*\": {notes: remarks}}\n").unwrap();
        assert_eq!(meta.renames.fields["*"]["notes"], "remarks");
        assert!(!meta.is_empty());
    }
}
