use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use patchlens_core::{
    open, CoreError, EngineConfig, ExecutionFrame, InspectorSession, MethodRef, OwnerClass,
    PushOutcome, Snapshot, SnapshotFilter, UniFfiTag,
};
use patchlens_source_api::{ProviderCapabilities, SourceProvider, SourceRegistry, SourceResult};
use tempfile::TempDir;

const DECOMPILED: &str = "class Pawn
{
    void Tick()
    {
        /* IL_0000 */ var h = obj.Health;
        /* IL_0008 */ return h;
    }
}
";

fn tokens(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

fn session() -> InspectorSession {
    InspectorSession::new(EngineConfig::default(), SourceRegistry::new()).expect("session")
}

fn tick_snapshot(owner: &str, timestamp_ms: i64) -> Snapshot {
    Snapshot::new(
        owner,
        "Verse.Pawn::Tick",
        timestamp_ms,
        tokens(&["ldarg.0", "callvirt Verse.Thing::get_Health()", "ret"]),
        tokens(&["ldarg.0", "call Verse.HealthUtility::get_Adjusted()", "ret"]),
    )
}

#[test]
fn history_keeps_latest_per_owner_and_method() {
    let session = session();
    session.record_snapshot(tick_snapshot("OtherMod", 20));
    session.record_snapshot(tick_snapshot("OtherMod", 10));
    session.record_snapshot(tick_snapshot("OtherMod", 30));
    session.record_snapshot(tick_snapshot("patchlens.core", 25));

    let all = session.query_snapshots(SnapshotFilter::default());
    let stamps: Vec<(String, i64)> = all
        .iter()
        .map(|snapshot| (snapshot.owner.clone(), snapshot.timestamp_ms))
        .collect();
    assert_eq!(
        stamps,
        vec![
            ("patchlens.core".to_owned(), 25),
            ("OtherMod".to_owned(), 30)
        ]
    );

    let external = session.query_snapshots(SnapshotFilter {
        owner_class: Some(OwnerClass::External),
        search: None,
    });
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].owner, "OtherMod");

    let searched = session.query_snapshots(SnapshotFilter {
        owner_class: None,
        search: Some("PAWN::TICK".to_owned()),
    });
    assert_eq!(searched.len(), 2);
}

#[test]
fn recorded_snapshot_is_normalized() {
    let session = session();
    let stored = session.record_snapshot(tick_snapshot("OtherMod", 1));
    assert_eq!(stored.patch_edits.len(), 1);
    assert_eq!(stored.added, 1);
    assert_eq!(stored.removed, 1);

    let rows = session
        .instruction_diff("OtherMod".to_owned(), "Verse.Pawn::Tick".to_owned())
        .expect("diff");
    assert_eq!(rows.len(), 4);
}

#[test]
fn unknown_snapshot_is_reported() {
    let session = session();
    let err = session
        .reconstruct("OtherMod".to_owned(), "Verse.Pawn::Tick".to_owned())
        .expect_err("nothing recorded");
    assert!(matches!(err, CoreError::SnapshotNotFound));
}

#[test]
fn provided_source_drives_reconstruction_and_correlation() {
    let session = session();
    session.record_snapshot(tick_snapshot("OtherMod", 1));

    let without_source = session
        .reconstruct("OtherMod".to_owned(), "Verse.Pawn::Tick".to_owned())
        .expect("reconstruct");
    assert!(without_source.used_overlay);
    assert_eq!(without_source.applied, 0);
    assert_eq!(
        session.map_instruction_to_source_line("Verse.Pawn::Tick".to_owned(), 4),
        None
    );

    session.provide_source("Verse.Pawn::Tick".to_owned(), DECOMPILED.to_owned());
    let rewritten = session
        .reconstruct("OtherMod".to_owned(), "Verse.Pawn::Tick".to_owned())
        .expect("reconstruct");
    assert_eq!(rewritten.applied, 1);
    assert!(rewritten.text.contains("var h = HealthUtility.Adjusted;"));

    let method = "Verse.Pawn::Tick".to_owned();
    assert_eq!(session.map_instruction_to_source_line(method.clone(), 4), Some(5));
    assert_eq!(session.map_instruction_to_source_line(method.clone(), 0x20), Some(6));

    assert!(session.invalidate_source(method.clone()));
    assert_eq!(session.map_instruction_to_source_line(method, 4), None);
}

#[test]
fn live_capture_through_session() {
    let session = session();
    let method = "Verse.Pawn::Tick".to_owned();
    assert_eq!(
        session.push_frame(method.clone(), ExecutionFrame::new(1, 0)),
        PushOutcome::NotAttached
    );
    assert_eq!(session.attach(method.clone()), None);
    for ts in 1..=3 {
        let frame = ExecutionFrame::new(ts, 0).with_field("hitPoints", "100");
        assert_eq!(session.push_frame(method.clone(), frame), PushOutcome::Accepted);
    }
    assert_eq!(session.recent_frames().len(), 3);
    assert_eq!(
        session.latest_frame().map(|frame| frame.timestamp_ms),
        Some(3)
    );
    assert!(session.detach());
    assert!(session.recent_frames().is_empty());
}

#[test]
fn report_and_export_cover_recorded_state() {
    let session = session();
    session.record_snapshot(tick_snapshot("OtherMod", 7));

    let report = session
        .report("OtherMod".to_owned(), "Verse.Pawn::Tick".to_owned())
        .expect("report");
    assert!(report.starts_with("== OtherMod :: Verse.Pawn::Tick =="));
    assert!(report.contains("-- reconstruction --"));

    let exported = session.export_history().expect("export");
    let parsed: Vec<Snapshot> = serde_json::from_str(&exported).expect("history json");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].timestamp_ms, 7);
}

#[test]
fn open_reads_config_file() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("patchlens.json");
    fs::write(&path, r#"{ "capture_capacity": 2, "deny_list": ["Health"] }"#).expect("write config");

    let session = open(Some(path.display().to_string())).expect("open");
    assert_eq!(session.config().deny_list, vec!["Health".to_owned()]);

    let broken = temp.path().join("broken.json");
    fs::write(&broken, "{ not json").expect("write config");
    let err = open(Some(broken.display().to_string())).expect_err("invalid json");
    assert!(matches!(err, CoreError::Json));

    let zero = temp.path().join("zero.json");
    fs::write(&zero, r#"{ "capture_capacity": 0 }"#).expect("write config");
    assert!(matches!(open(Some(zero.display().to_string())), Err(CoreError::Config)));
}

/// Decompiler whose output gains a leading blank line on every fetch.
struct Drifting {
    fetches: Arc<AtomicUsize>,
}

impl SourceProvider for Drifting {
    fn id(&self) -> &'static str {
        "drifting"
    }

    fn label(&self) -> &'static str {
        "Drifting"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::new(true, true)
    }

    fn fetch(&self, _method: &MethodRef) -> SourceResult<Option<String>> {
        let blank = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(format!(
            "void Tick()\n{{\n{}    /* IL_0000 */ run();\n}}\n",
            "\n".repeat(blank)
        )))
    }
}

#[test]
fn reloading_source_refreshes_line_map() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut registry = SourceRegistry::new();
    registry.register(Drifting {
        fetches: Arc::clone(&fetches),
    });
    let session = InspectorSession::new(EngineConfig::default(), registry).expect("session");
    let method = "Verse.Pawn::Tick".to_owned();

    assert_eq!(session.map_instruction_to_source_line(method.clone(), 0), Some(4));
    assert_eq!(session.map_instruction_to_source_line(method.clone(), 0), Some(4));
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    assert!(session.reload_source(method.clone()));
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert_eq!(session.map_instruction_to_source_line(method, 0), Some(5));
}

#[test]
fn scaffolding_tag_is_exported_at_crate_root() {
    let name = std::any::type_name::<UniFfiTag>();
    assert!(name.starts_with("patchlens_core::"));
    assert!(name.ends_with("UniFfiTag"));
}
