/// End-to-end tests: bytes in, actuator angles and replies out
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use stewart::{
    config::Config,
    controller::Controller,
    output::RecordingOutput,
    store::{BlobStore, FileStore, MemoryStore},
};
use stewart_core::{
    Pose,
    kinematics::{CompactGeometry, PlatformGeometry, solve},
};
use stewart_proto::{StreamDecoder, encode};

fn controller_with(store: Option<Arc<dyn BlobStore>>) -> (Controller, RecordingOutput) {
    let output = RecordingOutput::new();
    let controller = Controller::new(&Config::default(), Box::new(output.clone()), store).unwrap();
    (controller, output)
}

/// Decode `bytes` and hand every event to the controller, collecting replies.
fn feed(controller: &Controller, decoder: &mut StreamDecoder, bytes: &[u8], at: Instant) -> Vec<String> {
    let events: Vec<_> = decoder.feed(bytes).collect();
    events
        .into_iter()
        .flat_map(|event| controller.handle(event, at))
        .collect()
}

fn home_angles() -> [f64; 6] {
    let geometry = PlatformGeometry::from(&CompactGeometry::default());
    solve(&Pose::HOME, &geometry).0
}

#[test]
fn test_neutral_text_sample_commits_home() {
    let (controller, output) = controller_with(None);
    let mut decoder = StreamDecoder::new();

    let replies = feed(&controller, &mut decoder, b"2047,2047,2047,2047,2047,2047X", Instant::now());

    assert!(replies.is_empty());
    let commits = output.commits();
    assert_eq!(commits.len(), 2, "startup home plus one sample");
    assert_eq!(commits[1], home_angles());
    let snapshot = controller.snapshot().unwrap();
    assert!(snapshot.pose.is_home());
    assert!(snapshot.mask.is_empty());
}

#[test]
fn test_binary_frame_moves_platform() {
    let (controller, output) = controller_with(None);
    let mut decoder = StreamDecoder::new();

    let frame = encode(&[2047, 2047, 3071, 2047, 2047, 2047]);
    feed(&controller, &mut decoder, &frame, Instant::now());

    assert_eq!(output.commits().len(), 2);
    let snapshot = controller.snapshot().unwrap();
    assert!(snapshot.pose.0[2] > 0.0);
    assert_ne!(output.last().unwrap(), home_angles());
}

#[test]
fn test_corrupted_frame_is_dropped() {
    let (controller, output) = controller_with(None);
    let mut decoder = StreamDecoder::new();

    let mut frame = encode(&[2047, 2047, 3071, 2047, 2047, 2047]);
    frame[14] ^= 0xFF;
    let replies = feed(&controller, &mut decoder, &frame, Instant::now());

    assert!(replies.is_empty());
    assert_eq!(output.commits().len(), 1);

    // The stream recovers on the next good frame
    let frame = encode(&[2047; 6]);
    feed(&controller, &mut decoder, &frame, Instant::now());
    assert_eq!(output.commits().len(), 2);
}

#[test]
fn test_commands_interleave_with_frames() {
    let (controller, _) = controller_with(None);
    let mut decoder = StreamDecoder::new();

    let mut bytes = b"BITS?\n".to_vec();
    bytes.extend_from_slice(&encode(&[2047; 6]));
    bytes.extend_from_slice(b"SLEW?X");
    let replies = feed(&controller, &mut decoder, &bytes, Instant::now());

    assert_eq!(
        replies,
        vec![
            "BITS:12,max_raw=4095".to_string(),
            "SLEW:linear=0.500,angular=0.050".to_string(),
        ]
    );
}

#[test]
fn test_watchdog_ramps_home_after_silence() {
    let (controller, _) = controller_with(None);
    let mut decoder = StreamDecoder::new();
    let t0 = Instant::now();

    feed(&controller, &mut decoder, b"2047,2047,4094,2047,2047,2047X", t0);
    let raised = controller.snapshot().unwrap().pose.0[2];
    assert!(raised > 0.0);

    // Still inside the timeout: samples remain in control
    assert!(controller.tick(t0 + Duration::from_millis(400)).is_none());
    assert_eq!(controller.snapshot().unwrap().pose.0[2], raised);

    let mut now = t0 + Duration::from_millis(600);
    controller.tick(now);
    let first = controller.snapshot().unwrap().pose.0[2];
    assert!((raised - first - 0.5).abs() < 1e-9, "one slew step");

    for _ in 0..100 {
        now += Duration::from_millis(20);
        controller.tick(now);
    }
    assert!(controller.snapshot().unwrap().pose.is_home());
}

#[test]
fn test_soft_stop_ramps_and_sample_resumes() {
    let (controller, _) = controller_with(None);
    let mut decoder = StreamDecoder::new();
    let t0 = Instant::now();

    feed(&controller, &mut decoder, b"2047,2047,4094,2047,2047,2047X", t0);
    let replies = feed(&controller, &mut decoder, b"ESTOP:SOFT\n", t0);
    assert_eq!(replies, vec!["ESTOP:SOFT Servos homing to center".to_string()]);

    let after_stop = controller.snapshot().unwrap().pose.0[2];
    controller.tick(t0 + Duration::from_millis(20));
    assert!(controller.snapshot().unwrap().pose.0[2] < after_stop);

    // A fresh sample takes control back from the ramp
    feed(&controller, &mut decoder, b"2047,2047,2047,2047,2047,2047X", t0 + Duration::from_millis(40));
    let resumed = controller.snapshot().unwrap().pose.0[2];
    controller.tick(t0 + Duration::from_millis(60));
    assert_eq!(controller.snapshot().unwrap().pose.0[2], resumed);
}

#[test]
fn test_zero_jumps_home() {
    let (controller, output) = controller_with(None);
    let mut decoder = StreamDecoder::new();
    let t0 = Instant::now();

    feed(&controller, &mut decoder, b"2047,2047,4094,2047,2047,2047X", t0);
    let replies = feed(&controller, &mut decoder, b"ZERO\n", t0);

    assert_eq!(replies, vec!["ZERO:OK All servos at center".to_string()]);
    assert_eq!(output.last().unwrap(), home_angles());
}

#[test]
fn test_telemetry_follows_rate_command() {
    let (controller, _) = controller_with(None);
    let mut decoder = StreamDecoder::new();
    let t0 = Instant::now();

    assert!(controller.tick(t0).is_none());
    let replies = feed(&controller, &mut decoder, b"TELEM:10\n", t0);
    assert_eq!(replies, vec!["TELEM:rate=10".to_string()]);

    let line = controller.tick(t0).unwrap();
    assert!(line.starts_with("TELEM:"));
    assert_eq!(line.trim_start_matches("TELEM:").split(',').count(), 12);
    assert!(controller.tick(t0 + Duration::from_millis(50)).is_none());
    assert!(controller.tick(t0 + Duration::from_millis(110)).is_some());
}

#[test]
fn test_save_restores_in_memory() {
    let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
    let mut decoder = StreamDecoder::new();
    let now = Instant::now();

    let (controller, _) = controller_with(Some(store.clone()));
    feed(&controller, &mut decoder, b"BITS:10\nMCA:PRESET=RACE_PRO\n", now);
    assert_eq!(feed(&controller, &mut decoder, b"SAVE\n", now), vec!["SAVE:OK".to_string()]);
    drop(controller);

    let (restored, _) = controller_with(Some(store));
    assert_eq!(
        feed(&restored, &mut decoder, b"BITS?\n", now),
        vec!["BITS:10,max_raw=1023".to_string()]
    );
    let cueing = feed(&restored, &mut decoder, b"MCA?\n", now);
    assert!(cueing[0].contains("race_pro"), "{cueing:?}");
}

#[test]
fn test_save_restores_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut decoder = StreamDecoder::new();
    let now = Instant::now();

    let store: Arc<dyn BlobStore> = Arc::new(FileStore::new(dir.path()));
    let (controller, _) = controller_with(Some(store));
    feed(&controller, &mut decoder, b"CONFIG:RD=16.5\nSERVO:PULSE=900\n", now);
    assert_eq!(feed(&controller, &mut decoder, b"SAVE\n", now), vec!["SAVE:OK".to_string()]);
    drop(controller);

    assert!(dir.path().join("calibration.json").exists());
    assert!(dir.path().join("mca_cfg.json").exists());

    let store: Arc<dyn BlobStore> = Arc::new(FileStore::new(dir.path()));
    let (restored, _) = controller_with(Some(store));
    let config = feed(&restored, &mut decoder, b"CONFIG?\n", now);
    assert!(config[0].contains("RD=16.50"), "{config:?}");
    assert!(config[1].contains("pulse_per_rad=900.0"), "{config:?}");
}
