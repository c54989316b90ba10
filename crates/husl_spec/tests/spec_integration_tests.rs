//! Integration tests for specification documents.

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use husl_spec::{
    Constraint, RefactorApplier, RefactoringMetadata, ScopeSelection, SpecError, SpecParser,
    SpecValidator, SpecWriter,
};

const ORDERS: &str = include_str!("fixtures/orders.husl.md");

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/orders.husl.md")
}

/// The fixture parses and validates without any issue.
#[test]
fn test_fixture_is_clean() {
    let doc = SpecParser::parse_file(fixture_path()).unwrap();

    assert_eq!(doc.entities.len(), 3);
    assert_eq!(doc.operations.len(), 3);
    assert_eq!(doc.extra_sections[0].title, "Glossary");

    let report = SpecValidator::validate(&doc);
    assert!(report.valid, "Validation failed: {:?}", report.issues);
    assert!(report.issues.is_empty(), "Unexpected issues: {:?}", report.issues);
}

/// Every malformed line is reported in one pass, with its location.
#[test]
fn test_all_parse_errors_reported() {
    let broken = ORDERS
        .replace("email: Email (required)", "email: Email (required")
        .replace("quantity: Int (required, min:1)", "quantity: Int (mandatory)")
        .replace("Success: 200 Order\n  Custom", "Success: twohundred\n  Custom");

    let err = SpecParser::parse(&broken).unwrap_err();
    let errors = match err {
        SpecError::Parse(errors) => errors,
        other => panic!("expected parse errors, got {other}"),
    };
    assert_eq!(errors.len(), 3, "{}", errors);

    let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
    assert!(lines.windows(2).all(|w| w[0] < w[1]));
    assert!(errors.iter().any(|e| e.found == "mandatory"));
}

/// Wildcard field rename over three entities.
#[test]
fn test_wildcard_rename_scenario() {
    let doc = SpecParser::parse(ORDERS).unwrap();
    let refactored = RefactorApplier::apply_version(&doc, "1.1.0").unwrap();

    let notes = refactored
        .entities
        .iter()
        .filter(|e| e.field("notes").is_some())
        .count();
    let remarks = refactored
        .entities
        .iter()
        .filter(|e| e.field("remarks").is_some())
        .count();
    assert_eq!(notes, 0);
    assert_eq!(remarks, 3);

    let rule = refactored.rule("NotesAreShort").unwrap();
    assert_eq!(rule.clauses[0].when, "order.remarks is longer than 500 characters");

    let test = &refactored.operation("ShipOrder").unwrap().tests[0];
    assert_eq!(test.then[0].subject, "order.remarks");

    let text = SpecWriter::write(&refactored).unwrap();
    assert!(!text.contains(".notes"));

    let report = SpecValidator::validate(&refactored);
    assert!(report.valid, "Validation failed: {:?}", report.issues);
}

/// Renaming a referenced field keeps every reference resolvable.
#[test]
fn test_refactor_safety() {
    let doc = SpecParser::parse(ORDERS).unwrap();
    let meta = RefactoringMetadata::from_yaml("renames:\n  fields:\n    Customer: {id: key}\n").unwrap();

    let refactored = RefactorApplier::apply(&doc, &meta).unwrap();
    let customer_id = refactored.entity("Order").unwrap().field("customerId").unwrap();
    assert!(customer_id.constraints.contains(&Constraint::References {
        entity: "Customer".into(),
        field: "key".into()
    }));

    // `order.id` still addresses Order's own id.
    let test = &refactored.operation("GetOrder").unwrap().tests[0];
    assert_eq!(test.when.as_deref(), Some("GetOrder(order.id)"));

    let report = SpecValidator::validate(&refactored);
    assert_eq!(
        report.errors().filter(|i| i.code == "unresolved-reference").count(),
        0
    );
    assert!(report.valid);
}

/// Removing an operation that state machines and rules still use fails.
#[test]
fn test_removal_reports_every_referrer() {
    let doc = SpecParser::parse(ORDERS).unwrap();
    let meta = RefactoringMetadata::from_yaml("removals:\n  operations: [ShipOrder]\n").unwrap();

    let err = RefactorApplier::apply(&doc, &meta).unwrap_err();
    let err = match err {
        SpecError::DanglingReference(err) => err,
        other => panic!("expected dangling reference error, got {other}"),
    };
    let referrers: Vec<&str> = err.references.iter().map(|r| r.referrer.as_str()).collect();
    assert!(referrers.contains(&"State Machine OrderLifecycle / transition Paid -> Shipped"));
    assert!(referrers.contains(&"Rule PaidBeforeShipping"));
}

/// Written documents parse back to the same model.
#[test]
fn test_writer_round_trip_on_disk() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("orders.husl.md");

    let doc = SpecParser::parse(ORDERS).unwrap();
    SpecWriter::write_file(&doc, &path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("Orders service specification."));
    assert!(content.contains("# Glossary\n\nOrder: a purchase request."));

    let reparsed = SpecParser::parse_file(&path).unwrap();
    assert_eq!(doc, reparsed);
}

/// Selecting an operation pulls in the schema and rules it depends on.
#[test]
fn test_scope_closure() {
    let doc = SpecParser::parse(ORDERS).unwrap();
    let scope = ScopeSelection::resolve(&doc, &["ShipOrder"]).unwrap();

    assert!(scope.includes_operation("ShipOrder"));
    assert!(!scope.includes_operation("GetOrder"));
    assert!(scope.includes_entity("Order"));
    assert!(scope.includes_entity("LineItem"));
    assert!(scope.includes_entity("Customer"));
    assert!(scope.includes_enum("OrderStatus"));
    assert!(scope.includes_custom_type("Sku"));
    assert!(scope.includes_rule("PaidBeforeShipping"));
    assert!(!scope.includes_rule("NotesAreShort"));
}

/// The model serializes to JSON for tooling.
#[test]
fn test_model_to_json() {
    let doc = SpecParser::parse(ORDERS).unwrap();
    let json = doc.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["entities"][0]["name"], "Customer");
}
