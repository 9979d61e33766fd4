//! Source and scene item proxies driven through a live host thread.

#![allow(clippy::float_cmp)]

#[macro_use]
mod common;

use common::{fast_config, init_test_logging, wait_until, WAIT_LIMIT};

use hostbridge::api::{Crop, Pos, RefKind, SceneItem, Source, Value};
use hostbridge::lab::{HostLoop, SimHost};
use hostbridge::{Cx, ErrorKind};

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

fn studio() -> HostLoop<SimHost> {
    HostLoop::spawn(fast_config(), || {
        SimHost::new()
            .with_source("Camera", "v4l2_input", 4, 3)
            .with_source("Overlay", "browser_source", 2, 2)
            .with_scene_item("Main", "Camera")
    })
    .expect("start host loop")
}

#[test]
fn worker_edits_source_settings() {
    init_test("worker_edits_source_settings");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();
    let camera = Source::new(&bridge, "Camera");

    let handle = bridge
        .spawn(move |cx: Cx| {
            assert_eq!(camera.get_type(&cx)?, "v4l2_input");
            camera.set(&cx, "device", "/dev/video0")?;
            camera.update(&cx, [("width", Value::from(1280)), ("fps", Value::from(30))])?;
            camera.set(&cx, "fps", Value::Null)?;

            let props = camera.properties(&cx)?;
            assert_eq!(props.get("device"), Some(&Value::from("/dev/video0")));
            assert_eq!(camera.get(&cx, "width")?, Some(Value::Int(1280)));
            assert_eq!(camera.get(&cx, "fps")?, None);

            camera.set_sync_offset(&cx, -2_000_000)?;
            assert_eq!(camera.get_sync_offset(&cx)?, -2_000_000);
            Ok(())
        })
        .expect("spawn");
    handle.join().expect("worker succeeds");

    let props = bridge.host().properties_of("Camera").expect("camera exists");
    assert_eq!(props.len(), 2);
    test_complete!("worker_edits_source_settings");
}

#[test]
fn scene_item_placement_is_independent_of_the_source() {
    init_test("scene_item_placement_is_independent_of_the_source");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();
    let cx = Cx::detached();

    let item = SceneItem::new(&bridge, "Main", "Camera");
    item.set_pos(&cx, 100.0, 50.0).expect("set_pos");
    item.set_crop(&cx, Crop::new(1, 2, 3, 4)).expect("set_crop");
    item.source().adjust_crop(&cx, Crop::new(5, 0, 0, 0)).expect("adjust");

    assert_eq!(item.get_pos(&cx).expect("pos"), Pos { x: 100.0, y: 50.0 });
    assert_eq!(item.get_crop(&cx).expect("crop"), Crop::new(1, 2, 3, 4));
    assert_eq!(item.source().get_crop(&cx).expect("crop"), Crop::new(5, 0, 0, 0));
    assert_eq!(item.source().get_pos(&cx).expect("pos"), Pos::default());
    test_complete!("scene_item_placement_is_independent_of_the_source");
}

#[test]
fn concurrent_crop_adjustments_are_not_lost() {
    init_test("concurrent_crop_adjustments_are_not_lost");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let overlay = Source::new(&bridge, "Overlay");
            bridge
                .spawn(move |cx: Cx| {
                    for _ in 0..25 {
                        overlay.adjust_crop(&cx, Crop::new(1, 0, 1, 0))?;
                    }
                    Ok(())
                })
                .expect("spawn")
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker succeeds");
    }

    let crop = Source::new(&bridge, "Overlay")
        .get_crop(&Cx::detached())
        .expect("crop");
    assert_eq!(crop, Crop::new(100, 0, 100, 0));
    test_complete!("concurrent_crop_adjustments_are_not_lost");
}

#[test]
fn reference_counts_follow_calls() {
    init_test("reference_counts_follow_calls");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();
    let cx = Cx::detached();
    let camera = Source::new(&bridge, "Camera");

    camera.inc_showing(&cx).expect("inc");
    camera.inc_showing(&cx).expect("inc");
    camera.inc_active(&cx).expect("inc");
    camera.dec_showing(&cx).expect("dec");
    camera.get_type(&cx).expect("flush");

    assert_eq!(bridge.host().ref_count("Camera", RefKind::Showing), Some(1));
    assert_eq!(bridge.host().ref_count("Camera", RefKind::Active), Some(1));
    test_complete!("reference_counts_follow_calls");
}

#[test]
fn unknown_source_fails_and_stops_the_loop() {
    init_test("unknown_source_fails_and_stops_the_loop");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();
    let cx = Cx::detached();

    let err = Source::new(&bridge, "Missing")
        .get_type(&cx)
        .expect_err("no such source");
    assert_eq!(err.kind(), ErrorKind::Failed);
    assert!(wait_until(WAIT_LIMIT, || bridge.host().errors().len() == 1));
    assert!(!bridge.is_started());

    test_phase!("restart");
    assert!(bridge.start());
    let kind = Source::new(&bridge, "Overlay").get_type(&cx).expect("loop runs again");
    assert_eq!(kind, "browser_source");
    test_complete!("unknown_source_fails_and_stops_the_loop");
}

#[test]
fn frames_are_released_once_after_capture() {
    init_test("frames_are_released_once_after_capture");
    let host_loop = studio();
    let bridge = host_loop.bridge().clone();
    let camera = Source::new(&bridge, "Camera");

    let handle = bridge
        .spawn(move |cx: Cx| {
            let frame = camera.get_frame(&cx)?;
            assert_eq!(frame.width()?, 4);
            assert_eq!(frame.height()?, 3);
            assert_eq!(frame.depth()?, 4);
            let data = frame.data()?;
            assert_eq!(data.rows().count(), 3);
            assert_eq!(data.pixel(1, 0), Some(&[4, 5, 6, 7][..]));
            frame.close()?;

            // Dropped without ever being read.
            drop(camera.get_frame(&cx)?);
            Ok(())
        })
        .expect("spawn");
    handle.join().expect("worker succeeds");

    assert!(wait_until(WAIT_LIMIT, || bridge.host().live_frames() == 0));
    assert!(wait_until(WAIT_LIMIT, || bridge.pending_commands() == 0));
    let labels = bridge.host().call_labels();
    let captures = labels.iter().filter(|l| *l == "capture_frame").count();
    let releases = labels.iter().filter(|l| *l == "release_frame").count();
    assert_eq!((captures, releases), (2, 2));
    assert!(bridge.host().errors().is_empty());
    test_complete!("frames_are_released_once_after_capture");
}
