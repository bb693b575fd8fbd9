//! Frame loop tests with a scripted oracle and an in-memory transport


use opencv::{
    core::{Mat, Vec3b, Vector},
    imgcodecs,
    prelude::*,
};
use std::sync::{atomic::Ordering, Arc, Mutex};
use std::time::{Duration, Instant};
use test_helpers::{create_test_frame, region_at, RecordingTransport, ReleaseLog, ScriptedOracle, Step, VecFrameSource};
use vision_node::{
    codec::{decode_heartbeat, decode_movement, NodeStatus},
    node::VisionNode,
    transport::{Topics, TransportEvent},
    types::{LockPhase, MovementStatus},
};

const MOVEMENT_TOPIC: &str = "vision/dragonfly/movement";
const HEARTBEAT_TOPIC: &str = "vision/dragonfly/heartbeat";

type TestNode = VisionNode<VecFrameSource, ScriptedOracle, RecordingTransport>;

fn build(steps: Vec<Step>, frames: usize) -> (TestNode, ReleaseLog) {
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let source = VecFrameSource::repeat(frames, Arc::clone(&releases)).unwrap();
    let node = VisionNode::new(
        source,
        ScriptedOracle::new(steps),
        RecordingTransport::new(Arc::clone(&releases)),
        Topics::for_team("dragonfly"),
    );
    (node, releases)
}

fn at(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
}

#[test]
fn test_statuses_follow_target_position() {
    let steps = vec![
        Step::searching(),
        Step::locked(region_at(0.2)),
        Step::locked(region_at(0.8)),
        Step::locked_hidden(),
        Step::locked(region_at(0.5)),
        Step::searching(),
    ];
    let (mut node, _) = build(steps, 0);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    let statuses: Vec<MovementStatus> = (0..6)
        .map(|i| node.process_frame(&frame, at(start, i * 100)).unwrap())
        .map(|outcome| outcome.movement.expect("spaced frames are all admitted").status)
        .collect();

    assert_eq!(
        statuses,
        vec![
            MovementStatus::NoFace,
            MovementStatus::MoveLeft,
            MovementStatus::MoveRight,
            MovementStatus::MoveRight,
            MovementStatus::Centered,
            MovementStatus::NoFace,
        ]
    );
}

#[test]
fn test_snapshot_attached_once_per_lock_episode() {
    let steps = vec![
        Step::locked(region_at(0.5)),
        Step::locked(region_at(0.5)),
        Step::locked(region_at(0.3)),
        Step::searching(),
        Step::locked_hidden(),
        Step::locked(region_at(0.7)),
        Step::locked(region_at(0.7)),
    ];
    let (mut node, _) = build(steps, 0);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    let mut with_image = Vec::new();
    for i in 0..7 {
        let outcome = node.process_frame(&frame, at(start, i * 100)).unwrap();
        let message = outcome.movement.unwrap();
        assert_eq!(outcome.snapshot_taken, message.face_image.is_some());
        if message.face_image.is_some() {
            with_image.push(i);
        }
    }

    assert_eq!(with_image, vec![0, 5]);
    assert!(node.state().snapshot_sent);
}

#[test]
fn test_published_snapshot_is_padded_jpeg() {
    let (mut node, _) = build(vec![Step::locked(region_at(0.5))], 0);
    let frame = create_test_frame().unwrap();
    node.process_frame(&frame, Instant::now()).unwrap();

    let log = node.transport().log.lock().unwrap();
    let payloads = log.on_topic(MOVEMENT_TOPIC);
    assert_eq!(payloads.len(), 1);

    let message = decode_movement(&payloads[0]).unwrap();
    assert_eq!(message.status, MovementStatus::Centered);
    assert!(message.locked);
    assert_eq!(message.target, "andrew");

    let jpeg = message.face_image.unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let decoded = imgcodecs::imdecode(&Vector::<u8>::from_slice(&jpeg), imgcodecs::IMREAD_COLOR).unwrap();
    // 100x100 box plus 20 pixels of padding on each side
    assert_eq!(decoded.cols(), 140);
    assert_eq!(decoded.rows(), 140);
}

#[test]
fn test_movement_rate_is_capped() {
    let steps = (0..20).map(|_| Step::locked(region_at(0.8))).collect();
    let (mut node, _) = build(steps, 0);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    let admitted = (0..20)
        .filter(|&i| node.process_frame(&frame, at(start, i * 10)).unwrap().movement.is_some())
        .count();

    assert_eq!(admitted, 2);
    assert_eq!(node.transport().log.lock().unwrap().on_topic(MOVEMENT_TOPIC).len(), 2);
}

#[test]
fn test_snapshot_dropped_when_movement_not_admitted() {
    // Lock arrives 10 ms after the previous publish; the crop frame is throttled
    let steps = vec![Step::searching(), Step::locked(region_at(0.5)), Step::locked(region_at(0.5))];
    let (mut node, _) = build(steps, 0);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    node.process_frame(&frame, start).unwrap();
    let throttled = node.process_frame(&frame, at(start, 10)).unwrap();
    assert!(throttled.snapshot_taken);
    assert!(throttled.movement.is_none());

    let next = node.process_frame(&frame, at(start, 200)).unwrap();
    assert!(!next.snapshot_taken);
    assert!(next.movement.unwrap().face_image.is_none());
}

#[test]
fn test_heartbeat_on_connect_and_every_five_seconds() {
    let (mut node, _) = build(Vec::new(), 0);
    let log = Arc::clone(&node.transport().log);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    RecordingTransport::inject(&log, TransportEvent::Connected);
    assert_eq!(node.process_frame(&frame, start).unwrap().heartbeats, 1);
    assert_eq!(node.process_frame(&frame, at(start, 5000)).unwrap().heartbeats, 0);
    assert_eq!(node.process_frame(&frame, at(start, 5010)).unwrap().heartbeats, 1);

    // Reconnect announces immediately and restarts the timer
    RecordingTransport::inject(&log, TransportEvent::Disconnected("broker gone".to_string()));
    RecordingTransport::inject(&log, TransportEvent::Connected);
    assert_eq!(node.process_frame(&frame, at(start, 6000)).unwrap().heartbeats, 1);
    assert_eq!(node.process_frame(&frame, at(start, 10020)).unwrap().heartbeats, 0);
    assert_eq!(node.process_frame(&frame, at(start, 11010)).unwrap().heartbeats, 1);

    let heartbeats = log.lock().unwrap().on_topic(HEARTBEAT_TOPIC);
    assert_eq!(heartbeats.len(), 4);
    let message = decode_heartbeat(&heartbeats[0]).unwrap();
    assert_eq!(message.node, "pc_vision");
    assert_eq!(message.status, NodeStatus::Online);
}

#[test]
fn test_heartbeat_continues_while_searching() {
    let (mut node, _) = build(Vec::new(), 0);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    let total: usize = (0..=110)
        .map(|i| node.process_frame(&frame, at(start, i * 100)).unwrap())
        .inspect(|outcome| assert_eq!(outcome.phase, LockPhase::Searching))
        .map(|outcome| outcome.heartbeats)
        .sum();

    // t = 0, 5.1 s and 10.2 s
    assert_eq!(total, 3);
}

#[test]
fn test_heartbeat_survives_oracle_failures() {
    let (mut node, _) = build(vec![Step::Fail; 111], 0);
    let log = Arc::clone(&node.transport().log);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    for i in 0..=110 {
        assert!(node.process_frame(&frame, at(start, i * 100)).is_err());
    }

    // t = 0, 5.1 s and 10.2 s, same as a searching node
    assert_eq!(log.lock().unwrap().on_topic(HEARTBEAT_TOPIC).len(), 3);
    assert!(log.lock().unwrap().on_topic(MOVEMENT_TOPIC).is_empty());
}

#[test]
fn test_connect_heartbeat_sent_on_failing_frame() {
    let (mut node, _) = build(vec![Step::Fail], 0);
    let log = Arc::clone(&node.transport().log);
    RecordingTransport::inject(&log, TransportEvent::Connected);

    let frame = create_test_frame().unwrap();
    assert!(node.process_frame(&frame, Instant::now()).is_err());
    assert_eq!(log.lock().unwrap().on_topic(HEARTBEAT_TOPIC).len(), 1);
}

#[test]
fn test_publish_failure_streak_resets_on_success() {
    let (mut node, _) = build(Vec::new(), 0);
    let log = Arc::clone(&node.transport().log);
    let frame = create_test_frame().unwrap();
    let start = Instant::now();

    log.lock().unwrap().refuse = true;
    for i in 0..5 {
        node.process_frame(&frame, at(start, i * 100)).unwrap();
    }
    // Five movement messages plus the first-frame heartbeat
    assert_eq!(node.publish_failures(), 6);

    log.lock().unwrap().refuse = false;
    node.process_frame(&frame, at(start, 500)).unwrap();
    assert_eq!(node.publish_failures(), 0);
    assert_eq!(log.lock().unwrap().on_topic(MOVEMENT_TOPIC).len(), 1);
}

#[test]
fn test_transport_refusal_does_not_fail_frame() {
    let (mut node, _) = build(vec![Step::locked(region_at(0.5))], 0);
    node.transport().log.lock().unwrap().refuse = true;
    let frame = create_test_frame().unwrap();

    let outcome = node.process_frame(&frame, Instant::now()).unwrap();
    assert!(outcome.movement.is_some());
    assert!(node.transport().log.lock().unwrap().published.is_empty());
}

#[test]
fn test_unmirrored_frame_reaches_oracle_unchanged() {
    let oracle = ScriptedOracle::new(Vec::new());
    let pixels = Arc::clone(&oracle.first_pixels);
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let mut node = VisionNode::new(
        VecFrameSource::new(Vec::new(), Arc::clone(&releases)),
        oracle,
        RecordingTransport::new(releases),
        Topics::for_team("dragonfly"),
    );

    let mut frame = create_test_frame().unwrap();
    *frame.at_2d_mut::<Vec3b>(0, test_helpers::FRAME_WIDTH - 1).unwrap() = Vec3b::from([255, 255, 255]);
    node.process_frame(&frame, Instant::now()).unwrap();

    assert_eq!(pixels.lock().unwrap().as_slice(), &[128]);
}

#[test]
fn test_mirror_moves_right_edge_to_left() {
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let oracle = ScriptedOracle::new(Vec::new());
    let pixels = Arc::clone(&oracle.first_pixels);
    let mut node = VisionNode::new(
        VecFrameSource::new(Vec::new(), Arc::clone(&releases)),
        oracle,
        RecordingTransport::new(releases),
        Topics::for_team("dragonfly"),
    )
    .with_mirror(true);

    let mut frame = create_test_frame().unwrap();
    *frame.at_2d_mut::<Vec3b>(0, test_helpers::FRAME_WIDTH - 1).unwrap() = Vec3b::from([255, 255, 255]);
    node.process_frame(&frame, Instant::now()).unwrap();

    assert_eq!(pixels.lock().unwrap().as_slice(), &[255]);
}

#[test]
fn test_run_ends_at_end_of_stream_and_shuts_down_in_order() {
    let (mut node, releases) = build(Vec::new(), 5);
    node.run().unwrap();

    let published = node.transport().log.lock().unwrap().published.len();
    assert!(published >= 1);

    node.shutdown().unwrap();
    assert_eq!(releases.lock().unwrap().as_slice(), &["camera", "transport"]);
}

#[test]
fn test_run_ends_gracefully_on_camera_failure() {
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let oracle = ScriptedOracle::new(Vec::new());
    let pixels = Arc::clone(&oracle.first_pixels);
    let mut node = VisionNode::new(
        VecFrameSource::repeat(3, Arc::clone(&releases)).unwrap().failing_at_end(),
        oracle,
        RecordingTransport::new(Arc::clone(&releases)),
        Topics::for_team("dragonfly"),
    );

    node.run().unwrap();
    assert_eq!(pixels.lock().unwrap().len(), 3);
    node.shutdown().unwrap();
    assert_eq!(releases.lock().unwrap().as_slice(), &["camera", "transport"]);
}

#[test]
fn test_run_skips_frames_the_oracle_rejects() {
    let steps = vec![Step::locked(region_at(0.5)), Step::Fail, Step::locked(region_at(0.5))];
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let oracle = ScriptedOracle::new(steps);
    let pixels = Arc::clone(&oracle.first_pixels);
    let mut node = VisionNode::new(
        VecFrameSource::repeat(4, Arc::clone(&releases)).unwrap(),
        oracle,
        RecordingTransport::new(releases),
        Topics::for_team("dragonfly"),
    );

    node.run().unwrap();
    assert_eq!(pixels.lock().unwrap().len(), 4);
}

#[test]
fn test_stop_flag_prevents_frame_reads() {
    let releases: ReleaseLog = Arc::new(Mutex::new(Vec::new()));
    let oracle = ScriptedOracle::new(Vec::new());
    let pixels = Arc::clone(&oracle.first_pixels);
    let mut node = VisionNode::new(
        VecFrameSource::repeat(3, Arc::clone(&releases)).unwrap(),
        oracle,
        RecordingTransport::new(releases),
        Topics::for_team("dragonfly"),
    );

    node.stop_handle().store(true, Ordering::SeqCst);
    node.run().unwrap();
    assert!(pixels.lock().unwrap().is_empty());
}

#[test]
#[ignore = "Requires a webcam"]
fn test_camera_frame_through_node() {
    use vision_node::camera::{CameraSource, FrameSource};
    use vision_node::config::CameraConfig;

    let mut camera = CameraSource::open(&CameraConfig::default()).expect("No camera available");
    let frame: Mat = camera.read_frame().unwrap().expect("Camera returned no frame");
    let (mut node, _) = build(Vec::new(), 0);
    let outcome = node.process_frame(&frame, Instant::now()).unwrap();
    assert_eq!(outcome.status, MovementStatus::NoFace);
    camera.release().unwrap();
}
