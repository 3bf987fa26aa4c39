//! Configuration-driven engines and audit persistence across restarts.

use std::sync::Arc;

use tollgate_approval::{ApprovalEngine, Classification};
use tollgate_audit::{AuditAction, AuditTrail, JsonlAuditSink};
use tollgate_config::Config;
use tollgate_core::Decision;
use tollgate_telemetry::{LogConfig, LogFormat};
use tollgate_test::{ManualClock, quiet_config, test_command, test_file_edit};

fn write(path: &std::path::Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_engine_from_toml() {
    let config = Config::from_toml_str(
        r#"
        [patterns]
        extra_deny_signatures = ["terraform destroy"]

        [risk]
        utc_offset_minutes = 0

        [risk.off_hours]
        enabled = false
        "#,
    )
    .unwrap();

    let engine = ApprovalEngine::builder(config)
        .with_clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();

    let record = engine.decide(&test_command("terraform destroy -auto-approve")).unwrap();
    assert_eq!(record.decision, Decision::BlockWithWarning);
    assert!(record.classification.is_deny());

    let record = engine.decide(&test_command("cargo test --workspace")).unwrap();
    assert_eq!(record.decision, Decision::AutoApprove);
}

#[test]
fn test_invalid_toml_config_rejected() {
    let result = Config::from_toml_str(
        r"
        [thresholds]
        auto_approve = 0.5
        approve_with_log = 0.4
        ",
    );
    assert!(result.is_err());
}

#[test]
fn test_layered_config_drives_engine() {
    let home = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();

    write(
        &home.path().join("config.toml"),
        r#"
        [patterns]
        extra_deny_signatures = ["kubectl delete"]
        "#,
    );
    write(
        &workspace.path().join(".tollgate").join("config.toml"),
        r"
        [thresholds]
        block = 0.7
        ",
    );

    let resolved = Config::load_with_home(Some(workspace.path()), home.path()).unwrap();
    assert!((resolved.config.thresholds.block - 0.7).abs() < f64::EPSILON);

    let engine = ApprovalEngine::builder(resolved.config)
        .with_clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();
    let record = engine
        .decide(&test_command("kubectl delete namespace prod"))
        .unwrap();
    assert!(matches!(
        record.classification,
        Classification::AbsoluteDeny { .. }
    ));
}

#[test]
fn test_logging_section_converts() {
    let mut config = Config::default();
    config.logging.format = "json".to_owned();
    config.logging.directives = vec!["tollgate_approval=debug".to_owned()];

    let log = LogConfig::try_from(&config.logging).unwrap();
    assert_eq!(log.format, LogFormat::Json);
}

// ---------------------------------------------------------------------------
// Audit persistence
// ---------------------------------------------------------------------------

#[test]
fn test_audit_file_written_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let mut config = quiet_config();
    config.audit.path = Some(path.to_string_lossy().into_owned());

    let engine = ApprovalEngine::builder(config)
        .with_clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();
    engine.decide(&test_file_edit("src/lib.rs")).unwrap();
    engine.decide(&test_command("rm -rf /")).unwrap();
    engine.audit().flush();

    let entries = JsonlAuditSink::read_file(&path).unwrap();
    assert_eq!(entries.len(), 2);
    match &entries[1].action {
        AuditAction::Decision { decision, .. } => {
            assert_eq!(*decision, Decision::BlockWithWarning);
        },
        other => panic!("unexpected action {other:?}"),
    }
}

#[test]
fn test_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let intent = test_file_edit("app/main.js");

    {
        let sink = Arc::new(JsonlAuditSink::open(&path).unwrap());
        let audit = Arc::new(AuditTrail::in_memory(100).with_sink(sink));
        let engine = ApprovalEngine::builder(quiet_config())
            .with_clock(Arc::new(ManualClock::default()))
            .with_audit(audit)
            .build()
            .unwrap();
        engine.decide(&intent).unwrap();
        engine.report_outcome(&intent, false, Some("exit status 2"));
        engine.audit().flush();
    }

    let engine = ApprovalEngine::builder(quiet_config())
        .with_clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();
    let fresh = engine.assess(&intent).unwrap();

    let applied = engine.restore_history(&JsonlAuditSink::read_file(&path).unwrap());
    assert_eq!(applied, 2);

    let restored = engine.assess(&intent).unwrap();
    assert!(restored.value > fresh.value);
    assert!(restored.history > 0.0);
}

#[test]
fn test_reload_keeps_history() {
    let engine = ApprovalEngine::builder(quiet_config())
        .with_clock(Arc::new(ManualClock::default()))
        .build()
        .unwrap();
    let intent = test_file_edit("app/main.js");
    engine.decide(&intent).unwrap();

    let mut config = quiet_config();
    config.thresholds.block = 0.7;
    engine.reload(&config).unwrap();

    assert_eq!(engine.history(&intent.key()).len(), 1);
    assert!((engine.settings().policy().thresholds().block - 0.7).abs() < f64::EPSILON);
}
