use std::sync::Arc;

use op_toolkit_engine::device::traits::CameraKind;
use op_toolkit_engine::engine::notify::{ChannelSink, Notification};
use op_toolkit_engine::engine::progress::{ItemCounter, ProgressAggregator};
use op_toolkit_engine::engine::registry::TaskKey;

fn composites(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<u32> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if let Notification::CompositeProgress { percent, .. } = n {
            out.push(percent);
        }
    }
    out
}

#[test]
fn test_two_unit_composite() {
    let (sink, mut rx) = ChannelSink::new();
    let agg = ProgressAggregator::new(
        TaskKey::new("route-1"),
        [CameraKind::Front, CameraKind::Wide],
        Arc::new(sink),
    );

    agg.report(CameraKind::Front, 30);
    agg.report(CameraKind::Wide, 40);
    assert_eq!(agg.composite(), 70);
    agg.report(CameraKind::Front, 50);
    assert_eq!(agg.composite(), 90);

    assert_eq!(composites(&mut rx), vec![30, 70, 90]);
}

#[test]
fn test_concurrent_reports_publish_monotonic_composites() {
    let (sink, mut rx) = ChannelSink::new();
    let cameras = [CameraKind::Front, CameraKind::Wide, CameraKind::Driver];
    let agg = Arc::new(ProgressAggregator::new(
        TaskKey::new("route-2"),
        cameras,
        Arc::new(sink),
    ));

    let handles: Vec<_> = cameras
        .into_iter()
        .map(|camera| {
            let agg = Arc::clone(&agg);
            std::thread::spawn(move || {
                for percent in (0..=100).step_by(5) {
                    agg.report(camera, percent);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let observed = composites(&mut rx);
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(observed.last().copied(), Some(300));
    assert_eq!(agg.max_total(), 300);
}

#[test]
fn test_item_counter_counts_segments() {
    let (sink, mut rx) = ChannelSink::new();
    let counter = ItemCounter::new(TaskKey::new("gpx:r"), 3, Arc::new(sink));
    counter.increment();
    counter.increment();
    assert_eq!(counter.processed(), 2);
    assert_eq!(counter.total(), 3);
    assert_eq!(composites(&mut rx), vec![1, 2]);
}
