use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use op_toolkit_engine::config::NO_DEVICES_MESSAGE;
use op_toolkit_engine::device::mock::{dir_entry, file_entry, MockDevice, MockDiscovery, RecordingOpener};
use op_toolkit_engine::device::traits::{DeviceHandle, DeviceId, Route};
use op_toolkit_engine::engine::download::DownloadOutcome;
use op_toolkit_engine::engine::toolkit::EntryAction;
use op_toolkit_engine::engine::view::FleetView;
use op_toolkit_engine::{telemetry, ChannelSink, EngineConfig, Toolkit, ToolkitError};

fn config(dir: &std::path::Path) -> EngineConfig {
    EngineConfig {
        discovery_timeout_ms: 1_000,
        download_dir: dir.join("explorer").to_string_lossy().into_owned(),
        stream_release_timeout_ms: 1_000,
        ..EngineConfig::default()
    }
}

fn comma_three() -> Arc<MockDevice> {
    Arc::new(
        MockDevice::new("comma-3x")
            .with_working_directory("/data")
            .with_dir(
                "/data",
                vec![file_entry("/data", "boot.log"), dir_entry("/data", "params")],
            )
            .with_dir("/data/params", Vec::new())
            .with_file("/data/boot.log", "boot ok\n")
            .with_routes(vec![
                Route::new("2024-03-01--12-00-00", 3),
                Route::new("2024-03-02--08-15-00", 0),
            ]),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_browse_and_download() {
    telemetry::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let opener = Arc::new(RecordingOpener::default());
    let device = comma_three();
    let discovery = Arc::new(MockDiscovery::new(vec![device.clone() as DeviceHandle]));
    let toolkit = Toolkit::new(config(dir.path()), discovery, Arc::new(sink), opener.clone());

    let report = toolkit.scan().await.unwrap();
    assert_eq!(report.authenticated, vec![DeviceId::from("comma-3x")]);

    let mut view = FleetView::new();
    view.drain(&mut rx);
    let selected = view.selected_device().unwrap();
    assert_eq!(selected.id(), DeviceId::from("comma-3x"));

    assert_eq!(toolkit.load_routes(&selected).await.unwrap(), 2);

    let listing = toolkit.browse(selected.clone()).await.unwrap().unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(toolkit.current_path().as_deref(), Some("/data"));

    let params = dir_entry("/data", "params");
    let action = toolkit.open_entry(&params).await.unwrap();
    assert_eq!(action, EntryAction::Listed(Some(Vec::new())));
    assert_eq!(toolkit.current_path().as_deref(), Some("/data/params"));

    toolkit.navigate_up().await.unwrap();
    assert_eq!(toolkit.current_path().as_deref(), Some("/data"));

    let log = file_entry("/data", "boot.log");
    let EntryAction::Downloaded(DownloadOutcome::Materialized { path, .. }) =
        toolkit.open_entry(&log).await.unwrap()
    else {
        panic!("expected a materialized download");
    };
    assert_eq!(path, dir.path().join("explorer/data/boot.log"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "boot ok\n");
    assert_eq!(opener.opened(), vec![path.clone()]);

    view.drain(&mut rx);
    assert_eq!(view.routes().len(), 2);
    assert_eq!(view.directory().map(|(p, _)| p.as_str()), Some("/data"));
    assert!(view.errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failures_reach_the_view() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let discovery = Arc::new(MockDiscovery::new(Vec::new()));
    let toolkit = Toolkit::new(
        config(dir.path()),
        discovery,
        Arc::new(sink),
        Arc::new(RecordingOpener::default()),
    );

    assert!(matches!(
        toolkit.scan().await,
        Err(ToolkitError::NoDevicesFound)
    ));
    assert!(matches!(
        toolkit.open_entry(&file_entry("/data", "x")).await,
        Err(ToolkitError::NoDeviceSelected)
    ));

    let mut view = FleetView::new();
    view.drain(&mut rx);
    assert_eq!(view.errors().first().map(String::as_str), Some(NO_DEVICES_MESSAGE));
    assert!(view.devices().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_selecting_route_replaces_stream() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, _rx) = ChannelSink::new();
    let discovery = Arc::new(MockDiscovery::new(Vec::new()));
    let toolkit = Toolkit::new(
        config(dir.path()),
        discovery,
        Arc::new(sink),
        Arc::new(RecordingOpener::default()),
    );
    let drive = Route::new("2024-03-01--12-00-00", 3);

    let first = toolkit.select_route(&drive).await.unwrap();
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);
    let player = tokio::spawn(async move {
        first.cancelled().await;
        flag.store(true, Ordering::SeqCst);
    });

    let second = toolkit.select_route(&drive).await.unwrap();
    assert!(released.load(Ordering::SeqCst));
    assert!(!second.is_cancelled());
    player.await.unwrap();

    // Nothing to play; the current stream stays.
    assert!(toolkit.select_route(&Route::new("empty", 0)).await.is_none());
    assert!(!second.is_cancelled());

    toolkit.stop_playback().await;
    assert!(second.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_periodic_scan_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, _rx) = ChannelSink::new();
    let discovery = Arc::new(MockDiscovery::new(vec![comma_three() as DeviceHandle]));
    let toolkit = Arc::new(Toolkit::new(
        EngineConfig {
            scan_interval_ms: 40,
            ..config(dir.path())
        },
        discovery.clone(),
        Arc::new(sink),
        Arc::new(RecordingOpener::default()),
    ));

    let shutdown = CancellationToken::new();
    let handle = toolkit.spawn_periodic_scan(shutdown.clone());
    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let passes = discovery.passes();
    assert!(passes >= 2, "only {} scans ran", passes);
    assert!(!toolkit.is_scanning());
}
