//! Integration tests for planning and regeneration against a real directory.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use husl_core::{
    ArtifactOutcome, ArtifactTree, Cancellation, ChangeStatus, ConflictKind, EngineError,
    RegenEngine, RenameMap,
};
use husl_spec::{HookType, RefactoringMetadata, SpecWriter};
use husl_templates::{contract_fingerprint, StackConfig};

const ORDERS: &str = include_str!("../../husl_spec/tests/fixtures/orders.husl.md");

const WIDGETS: &str = "# Schema\nEntity: Widget\n  id: UUID (required)\n\n# Operations\nOperation: GetWidget\n  Endpoint: GET /widgets/{id}\n  Success: 200 Widget\n";

const PAY_ORDER: &str = "src/operations/pay-order.ts";
const SETTLE_ORDER: &str = "src/operations/settle-order.ts";
const FRAUD_DEFAULT: &str = "  // contract: check(order: Order) -> bool\n";
const FRAUD_CUSTOM: &str = "  if (await isFraudulent(input.id)) throw new Error(\"blocked\");\n";

fn engine() -> RegenEngine {
    RegenEngine::new().with_timestamp("2026-01-01T00:00:00Z")
}

fn generate(engine: &RegenEngine, text: &str, out: &Path) -> husl_core::RunReport {
    let tree = ArtifactTree::load(out).unwrap();
    engine
        .generate(text, &tree, &StackConfig::default(), None, &Cancellation::new())
        .unwrap()
}

fn plan(engine: &RegenEngine, text: &str, out: &Path) -> husl_core::ChangeSet {
    let tree = ArtifactTree::load(out).unwrap();
    engine.plan(text, &tree, &StackConfig::default(), None).unwrap()
}

/// Replace the default body of `fraud_check` with hand-written code.
fn customize_fraud_check(out: &Path) -> String {
    let path = out.join(PAY_ORDER);
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains(FRAUD_DEFAULT));
    let edited = content.replacen(FRAUD_DEFAULT, FRAUD_CUSTOM, 1);
    fs::write(&path, &edited).unwrap();
    edited
}

/// A one-entity, one-operation document creates exactly two artifacts.
#[test]
fn test_clean_generation() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");

    let changes = plan(&engine(), WIDGETS, &out);
    assert_eq!(changes.entries.len(), 2);
    assert_eq!(changes.count(ChangeStatus::WouldCreate), 2);

    let report = generate(&engine(), WIDGETS, &out);
    assert_eq!(report.count(ArtifactOutcome::Written), 2);
    assert!(out.join("src/models/widget.ts").exists());
    assert!(out.join("src/operations/get-widget.ts").exists());
}

/// The same document and configuration produce byte-identical trees.
#[test]
fn test_generation_is_deterministic() {
    let temp = tempdir().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");

    generate(&engine(), ORDERS, &first);
    generate(&engine(), ORDERS, &second);

    let a = ArtifactTree::load(&first).unwrap();
    let b = ArtifactTree::load(&second).unwrap();
    assert_eq!(a.len(), 10);
    assert_eq!(a.paths().collect::<Vec<_>>(), b.paths().collect::<Vec<_>>());
    for path in a.paths() {
        assert_eq!(a.get(path), b.get(path), "{}", path);
    }

    let json_a = plan(&engine(), ORDERS, &temp.path().join("empty")).to_json().unwrap();
    let json_b = plan(&engine(), ORDERS, &temp.path().join("empty")).to_json().unwrap();
    assert_eq!(json_a, json_b);
}

/// Regenerating an unchanged document reports every artifact unchanged,
/// even when only the header timestamp would differ.
#[test]
fn test_idempotent_regeneration() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);

    let changes = plan(&engine(), ORDERS, &out);
    assert_eq!(changes.count(ChangeStatus::Unchanged), changes.entries.len());

    let later = RegenEngine::new().with_timestamp("2031-03-04T05:06:07Z");
    let changes = plan(&later, ORDERS, &out);
    assert_eq!(changes.count(ChangeStatus::Unchanged), changes.entries.len());

    let report = generate(&later, ORDERS, &out);
    assert_eq!(report.count(ArtifactOutcome::Unchanged), report.artifacts.len());
    let header = fs::read_to_string(out.join(PAY_ORDER)).unwrap();
    assert!(header.starts_with("// Generated by husl at 2026-01-01T00:00:00Z.\n"));
}

/// Hand-written region content survives a change elsewhere in the artifact.
#[test]
fn test_region_preservation() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    customize_fraud_check(&out);

    // Editing inside a region is not a pending change.
    let changes = plan(&engine(), ORDERS, &out);
    assert_eq!(changes.entry(PAY_ORDER).unwrap().status, ChangeStatus::Unchanged);

    let changed = ORDERS.replace(
        "Endpoint: POST /orders/{id}/pay\n  Input:\n    Path:\n      id: UUID (required)\n  Success: 200 Order",
        "Endpoint: POST /orders/{id}/pay\n  Input:\n    Path:\n      id: UUID (required)\n  Success: 202 Order",
    );
    let changes = plan(&engine(), &changed, &out);
    let entry = changes.entry(PAY_ORDER).unwrap();
    assert_eq!(entry.status, ChangeStatus::WouldModify);
    let delta = entry.delta.as_deref().unwrap();
    assert!(delta.contains("+  status: 202,\n"));
    assert!(!delta.contains("isFraudulent"));

    let report = generate(&engine(), &changed, &out);
    assert_eq!(report.artifact(PAY_ORDER).unwrap().outcome, ArtifactOutcome::Written);
    let content = fs::read_to_string(out.join(PAY_ORDER)).unwrap();
    assert!(content.contains(FRAUD_CUSTOM));
    assert!(!content.contains(FRAUD_DEFAULT));
    assert!(content.contains("  status: 202,\n"));
}

/// Changing a hook type with custom content present is a blocking conflict
/// and leaves the file untouched.
#[test]
fn test_signature_mismatch_blocks_write() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    let edited = customize_fraud_check(&out);

    let changed = ORDERS.replace("fraud_check (before,", "fraud_check (replace,");
    let changes = plan(&engine(), &changed, &out);
    let entry = changes.entry(PAY_ORDER).unwrap();
    assert_eq!(entry.status, ChangeStatus::WouldConflict);
    assert_eq!(entry.conflicts.len(), 1);
    assert_eq!(entry.conflicts[0].kind, ConflictKind::SignatureMismatch);
    assert_eq!(entry.conflicts[0].region.as_deref(), Some("fraud_check"));

    let report = generate(&engine(), &changed, &out);
    assert!(report.has_conflicts());
    assert_eq!(report.count(ArtifactOutcome::SkippedConflict), 1);
    assert_eq!(report.count(ArtifactOutcome::Unchanged), 9);
    assert_eq!(fs::read_to_string(out.join(PAY_ORDER)).unwrap(), edited);
}

/// Removing a custom implementation entry orphans its region.
#[test]
fn test_orphaned_region() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    let before = fs::read_to_string(out.join(PAY_ORDER)).unwrap();

    let changed = ORDERS.replace(
        "  Custom: fraud_check (before, contract:check(order: Order) -> bool)\n",
        "",
    );
    let changes = plan(&engine(), &changed, &out);
    let entry = changes.entry(PAY_ORDER).unwrap();
    assert_eq!(entry.status, ChangeStatus::WouldConflict);
    assert_eq!(entry.conflicts[0].kind, ConflictKind::OrphanedRegion);

    let json = changes.to_json().unwrap();
    assert!(json.contains("\"status\": \"would-conflict\""));
    assert!(json.contains("\"kind\": \"orphaned-region\""));

    let report = generate(&engine(), &changed, &out);
    assert_eq!(
        report.artifact(PAY_ORDER).unwrap().outcome,
        ArtifactOutcome::SkippedConflict
    );
    assert_eq!(fs::read_to_string(out.join(PAY_ORDER)).unwrap(), before);
}

/// A region pasted twice into an artifact is reported, not resolved.
#[test]
fn test_duplicate_region() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);

    let fingerprint = contract_fingerprint(HookType::Before, Some("check(order: Order) -> bool"));
    let path = out.join(PAY_ORDER);
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str(&format!(
        "// HUSL-CUSTOM-BEGIN fraud_check hook=before contract={}\n// HUSL-CUSTOM-END fraud_check\n",
        fingerprint
    ));
    fs::write(&path, content).unwrap();

    let changes = plan(&engine(), ORDERS, &out);
    let entry = changes.entry(PAY_ORDER).unwrap();
    assert_eq!(entry.conflicts[0].kind, ConflictKind::DuplicateRegion);
}

/// Malformed markers block only their own artifact.
#[test]
fn test_malformed_markers_are_scoped_to_artifact() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);

    let path = out.join("src/operations/get-order.ts");
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str("// HUSL-CUSTOM-BEGIN stray hook=after contract=00\n");
    fs::write(&path, &content).unwrap();

    let changed = ORDERS.replace("Success: 200 Order\n  Failure: 404", "Success: 203 Order\n  Failure: 404");
    let report = generate(&engine(), &changed, &out);
    let get_order = report.artifact("src/operations/get-order.ts").unwrap();
    assert_eq!(get_order.outcome, ArtifactOutcome::SkippedConflict);
    assert_eq!(get_order.conflicts[0].kind, ConflictKind::MalformedMarker);
    assert_eq!(fs::read_to_string(&path).unwrap(), content);
    assert_eq!(report.count(ArtifactOutcome::Unchanged), 9);
}

/// Applying the 1.1.0 refactoring renames `notes` everywhere and keeps
/// custom regions intact on the next generation.
#[test]
fn test_refactor_then_regenerate() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    customize_fraud_check(&out);

    let doc = engine().refactor_to_version(ORDERS, "1.1.0").unwrap();
    for entity in &doc.entities {
        assert!(entity.fields.iter().any(|f| f.name == "remarks"), "{}", entity.name);
        assert!(entity.fields.iter().all(|f| f.name != "notes"), "{}", entity.name);
    }
    let refactored = SpecWriter::write(&doc).unwrap();
    assert!(engine().validate(&refactored).unwrap().valid);

    let changes = plan(&engine(), &refactored, &out);
    assert!(!changes.has_conflicts());
    assert_eq!(changes.entry("src/models/order.ts").unwrap().status, ChangeStatus::WouldModify);
    assert_eq!(changes.entry("src/enums/order-status.ts").unwrap().status, ChangeStatus::Unchanged);

    let report = generate(&engine(), &refactored, &out);
    assert!(!report.has_conflicts());
    assert!(!report.has_failures());

    let order = fs::read_to_string(out.join("src/models/order.ts")).unwrap();
    assert!(order.contains("  remarks?: string;\n"));
    assert!(!order.contains("notes?:"));

    let pay = fs::read_to_string(out.join(PAY_ORDER)).unwrap();
    assert!(pay.contains(FRAUD_CUSTOM));
    assert!(pay.contains("order.remarks is longer than 500 characters"));
}

/// Renaming an operation moves its artifact and the custom code with it.
#[test]
fn test_rename_carries_custom_regions() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    customize_fraud_check(&out);

    let metadata = RefactoringMetadata::from_yaml("renames:\n  operations: {PayOrder: SettleOrder}\n").unwrap();
    let doc = engine().refactor(ORDERS, &metadata).unwrap();
    let renamed = SpecWriter::write(&doc).unwrap();

    let engine = engine().with_renames(RenameMap::from_metadata(&metadata));
    let changes = plan(&engine, &renamed, &out);
    let entry = changes.entry(SETTLE_ORDER).unwrap();
    assert_eq!(entry.status, ChangeStatus::WouldCreate);
    assert_eq!(entry.renamed_from.as_deref(), Some(PAY_ORDER));
    assert!(!entry.delta.as_deref().unwrap().contains("isFraudulent"));

    let report = generate(&engine, &renamed, &out);
    assert!(!report.has_conflicts());
    let artifact = report.artifact(SETTLE_ORDER).unwrap();
    assert_eq!(artifact.outcome, ArtifactOutcome::Written);
    assert_eq!(artifact.renamed_from.as_deref(), Some(PAY_ORDER));
    assert_eq!(report.stale, vec![PAY_ORDER]);

    let settle = fs::read_to_string(out.join(SETTLE_ORDER)).unwrap();
    assert!(settle.contains(FRAUD_CUSTOM));
    assert!(!settle.contains(FRAUD_DEFAULT));
    assert!(settle.contains("export async function settleOrder("));

    // Once written, the new path is regenerated in place.
    let changes = plan(&engine, &renamed, &out);
    assert_eq!(changes.entry(SETTLE_ORDER).unwrap().status, ChangeStatus::Unchanged);
}

/// Renames recorded in the version history are followed without being
/// passed to the engine.
#[test]
fn test_version_history_renames_carry_custom_regions() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    customize_fraud_check(&out);

    let versioned = format!(
        "{}\nVersion: 1.2.0 (minor)\n  - PayOrder becomes SettleOrder\n  Refactoring:\n    renames:\n      operations: {{PayOrder: SettleOrder}}\n",
        ORDERS
    );
    let doc = engine().refactor_to_version(&versioned, "1.2.0").unwrap();
    assert!(doc.operation("SettleOrder").is_some());
    let renamed = SpecWriter::write(&doc).unwrap();

    let report = generate(&engine(), &renamed, &out);
    assert_eq!(
        report.artifact(SETTLE_ORDER).unwrap().renamed_from.as_deref(),
        Some(PAY_ORDER)
    );
    let settle = fs::read_to_string(out.join(SETTLE_ORDER)).unwrap();
    assert!(settle.contains(FRAUD_CUSTOM));
}

/// Custom code that cannot follow a rename blocks the renamed artifact.
#[test]
fn test_rename_with_broken_markers_conflicts() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), ORDERS, &out);
    let edited = customize_fraud_check(&out);
    fs::write(out.join(PAY_ORDER), edited.replace("// HUSL-CUSTOM-END fraud_check", "")).unwrap();

    let metadata = RefactoringMetadata::from_yaml("renames:\n  operations: {PayOrder: SettleOrder}\n").unwrap();
    let renamed = SpecWriter::write(&engine().refactor(ORDERS, &metadata).unwrap()).unwrap();

    let engine = engine().with_renames(RenameMap::from_metadata(&metadata));
    let report = generate(&engine, &renamed, &out);
    let artifact = report.artifact(SETTLE_ORDER).unwrap();
    assert_eq!(artifact.outcome, ArtifactOutcome::SkippedConflict);
    assert_eq!(artifact.conflicts[0].kind, ConflictKind::MalformedMarker);
    assert!(!out.join(SETTLE_ORDER).exists());
}

/// A non-text file at an artifact path is reported, never overwritten.
#[test]
fn test_unreadable_artifact_is_left_alone() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(out.join("src/models")).unwrap();
    fs::write(out.join("src/models/widget.ts"), [0xff]).unwrap();

    let changes = plan(&engine(), WIDGETS, &out);
    let entry = changes.entry("src/models/widget.ts").unwrap();
    assert_eq!(entry.status, ChangeStatus::WouldConflict);
    assert_eq!(entry.conflicts[0].kind, ConflictKind::UnreadableArtifact);

    let report = generate(&engine(), WIDGETS, &out);
    assert_eq!(
        report.artifact("src/models/widget.ts").unwrap().outcome,
        ArtifactOutcome::SkippedConflict
    );
    assert_eq!(fs::read(out.join("src/models/widget.ts")).unwrap(), vec![0xff]);
    assert_eq!(report.count(ArtifactOutcome::Written), 1);
}

/// Files that look generated but are no longer projected are listed.
#[test]
fn test_stale_artifacts_are_reported() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    generate(&engine(), WIDGETS, &out);
    fs::write(out.join("NOTES.md"), "hand written\n").unwrap();

    let without_operation = "# Schema\nEntity: Widget\n  id: UUID (required)\n";
    let changes = plan(&engine(), without_operation, &out);
    assert_eq!(changes.entries.len(), 1);
    assert_eq!(changes.stale, vec!["src/operations/get-widget.ts"]);

    let report = generate(&engine(), without_operation, &out);
    assert_eq!(report.stale, vec!["src/operations/get-widget.ts"]);
    assert!(out.join("src/operations/get-widget.ts").exists());
}

/// A selective run only touches the selected operation and what it uses.
#[test]
fn test_selective_regeneration() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    let scope = vec!["ShipOrder".to_string()];

    let tree = ArtifactTree::load(&out).unwrap();
    let report = engine()
        .generate(
            ORDERS,
            &tree,
            &StackConfig::default(),
            Some(scope.as_slice()),
            &Cancellation::new(),
        )
        .unwrap();
    assert_eq!(report.count(ArtifactOutcome::Written), 7);
    assert!(out.join("src/operations/ship-order.ts").exists());
    assert!(!out.join(PAY_ORDER).exists());

    generate(&engine(), ORDERS, &out);
    let tree = ArtifactTree::load(&out).unwrap();
    let changes = engine()
        .plan(ORDERS, &tree, &StackConfig::default(), Some(scope.as_slice()))
        .unwrap();
    assert_eq!(changes.entries.len(), 7);
    assert!(changes.stale.is_empty());

    let err = engine()
        .plan(ORDERS, &tree, &StackConfig::default(), Some(&["Nope".to_string()][..]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Spec(_)));
}

/// A cancelled run writes nothing and reports every artifact as cancelled.
#[test]
fn test_cancelled_run_writes_nothing() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    let cancel = Cancellation::new();
    cancel.cancel();

    let tree = ArtifactTree::load(&out).unwrap();
    let report = engine()
        .generate(ORDERS, &tree, &StackConfig::default(), None, &cancel)
        .unwrap();
    assert!(report.was_cancelled());
    assert_eq!(report.count(ArtifactOutcome::Cancelled), report.artifacts.len());
    assert!(!out.exists());
}

/// Parse failures abort before anything is planned or written.
#[test]
fn test_parse_failure_aborts() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("out");
    let broken = ORDERS.replace("email: Email (required)", "email: Email (required");

    let tree = ArtifactTree::load(&out).unwrap();
    let err = engine()
        .generate(&broken, &tree, &StackConfig::default(), None, &Cancellation::new())
        .unwrap_err();
    assert!(err.is_parse_error());
    assert!(!out.exists());
}
