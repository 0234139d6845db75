use header_sync::{app::App, config::AppConfig, read_hex_file};
use header_sync_core::HeaderSyncError;
use header_sync_cosmos::test_utils::{test_validators, HeaderBuilder};
use serde_json::json;

fn app_in(dir: &std::path::Path) -> App {
    let config = AppConfig::from_value(json!({
        "state_path": dir.join("state.json"),
        "chains": [{ "chain_id": 5, "family": "cosmos" }]
    }))
    .unwrap();
    App::new(&config).unwrap()
}

#[test]
fn state_persists_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let validators = test_validators(&[10, 10, 10]);
    let genesis = HeaderBuilder::new("testing", 100, &validators).build();
    let h1 = HeaderBuilder::new("testing", 101, &validators)
        .parent(&genesis.hash)
        .build();

    let genesis_file = dir.path().join("100.hex");
    std::fs::write(&genesis_file, hex::encode(&genesis.bytes)).unwrap();

    let status = app_in(dir.path()).status(5).unwrap();
    assert_eq!(status.family, "cosmos");
    assert!(status.current.is_none());

    let info = app_in(dir.path())
        .genesis(5, read_hex_file(&genesis_file).unwrap(), &[])
        .unwrap();
    assert_eq!(info.height, 100);

    let report = app_in(dir.path())
        .sync(5, [1; 20], vec![h1.bytes.clone()])
        .unwrap();
    assert_eq!(report.applied, vec![101]);

    let app = app_in(dir.path());
    let status = app.status(5).unwrap();
    assert_eq!(status.genesis_height, Some(100));
    assert_eq!(status.external_chain_id.as_deref(), Some("testing"));
    assert_eq!(status.current.unwrap().hash, h1.hash.to_vec());
    assert_eq!(status.epoch_heights, vec![100]);

    assert_eq!(app.epoch(5, Some(101)).unwrap().height, 100);
    assert_eq!(app.epoch(5, None).unwrap(), info);
    let err = app.epoch(5, Some(99)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HeaderSyncError>(),
        Some(HeaderSyncError::NotFound { chain_id: 5, .. })
    ));
}

#[test]
fn rejected_batches_leave_the_state_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let validators = test_validators(&[10, 10, 10]);
    let genesis = HeaderBuilder::new("testing", 100, &validators).build();
    let app = app_in(dir.path());
    app.genesis(5, genesis.bytes.clone(), &[]).unwrap();
    let before = std::fs::read(dir.path().join("state.json")).unwrap();

    let weak = HeaderBuilder::new("testing", 101, &validators)
        .parent(&genesis.hash)
        .signers(&[0])
        .build();
    let err = app.sync(5, [1; 20], vec![weak.bytes]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HeaderSyncError>(),
        Some(HeaderSyncError::Quorum { height: 101, .. })
    ));
    assert_eq!(std::fs::read(dir.path().join("state.json")).unwrap(), before);

    assert!(matches!(
        app.status(6).unwrap_err().downcast_ref::<HeaderSyncError>(),
        Some(HeaderSyncError::UnknownChain { chain_id: 6 })
    ));
}
