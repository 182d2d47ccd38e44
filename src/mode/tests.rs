use super::*;
use crate::audio::{Cue, CueBank, CuePlayer, SimulatedCuePlayer};
use crate::config::SnapcamConfig;
use crate::controller::CaptureController;
use crate::device::{LedState, SensorSelect, SimulatedDevice};
use crate::frame::ReelBuffer;
use std::time::Duration;
use tokio::time::Instant;

struct Rig {
    manager: CaptureModeManager,
    device: SimulatedDevice,
    player: SimulatedCuePlayer,
    reel: ReelBuffer,
}

fn rig(sensor: SensorSelect) -> Rig {
    let mut config = SnapcamConfig::default();
    config.audio.shutter_delay_ms = 0;
    config.audio.cue_retry_interval_ms = 0;
    config.audio.drain_poll_ms = 0;

    let geometry = config.camera.geometry();
    Rig {
        manager: CaptureModeManager::new(
            CueBank::silent(),
            &config.audio,
            &config.reel,
            sensor,
        ),
        device: SimulatedDevice::new(),
        player: SimulatedCuePlayer::new(),
        reel: ReelBuffer::with_capacity(geometry, 3).unwrap(),
    }
}

fn record_frames(reel: &mut ReelBuffer, count: usize) {
    let frame = vec![7u16; reel.geometry().pixel_count()];
    for _ in 0..count {
        reel.push(&frame);
    }
}

#[tokio::test]
async fn test_still_capture_flow() {
    let mut r = rig(SensorSelect::Inner);

    let t = r
        .manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    assert_eq!(t, Transition::Applied);
    assert_eq!(r.manager.mode(), Mode::StillArmed);
    assert!(r.manager.still_due(Instant::now()));
    assert_eq!(r.player.played(), &[Cue::Shutter]);
    assert!(r.device.led_history().is_empty());

    assert!(!r.manager.take_captured_still());
    r.manager.mark_still_captured();
    assert!(r.manager.take_captured_still());
    assert_eq!(r.manager.mode(), Mode::Idle);
    assert!(r.manager.still_state().is_none());
    assert!(!r.manager.take_captured_still());
}

#[tokio::test]
async fn test_still_waits_for_shutter_delay() {
    let mut config = SnapcamConfig::default();
    config.audio.shutter_delay_ms = 200;
    let mut manager = CaptureModeManager::new(
        CueBank::silent(),
        &config.audio,
        &config.reel,
        SensorSelect::Inner,
    );
    let mut device = SimulatedDevice::new();
    let mut player = SimulatedCuePlayer::new();

    manager.request_still_capture(&mut device, &mut player).await;
    let now = Instant::now();
    assert!(!manager.still_due(now));
    assert!(manager.still_due(now + Duration::from_millis(250)));
}

#[tokio::test]
async fn test_outer_sensor_led_side_effects() {
    let mut r = rig(SensorSelect::Outer);

    r.manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    assert_eq!(r.device.led(), LedState::Off);
    r.manager.mark_still_captured();
    r.manager.take_captured_still();

    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(r.device.led(), LedState::Blinking);

    r.manager
        .request_stop_recording(&mut r.device, &mut r.player, &r.reel, false)
        .await;
    assert_eq!(
        r.device.led_history(),
        &[LedState::Off, LedState::Blinking, LedState::On]
    );
}

#[tokio::test]
async fn test_still_and_recording_are_exclusive() {
    let mut r = rig(SensorSelect::Inner);

    r.manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    let t = r
        .manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::StillPending));
    let t = r
        .manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::StillPending));

    r.manager.mark_still_captured();
    r.manager.take_captured_still();

    let t = r
        .manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(t, Transition::Applied);
    assert!(r.manager.session().is_some());

    let t = r
        .manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::Recording));
    let t = r
        .manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::Recording));
    assert_eq!(r.player.played(), &[Cue::Shutter, Cue::RecordBegin]);
}

#[tokio::test]
async fn test_start_recording_resets_reel() {
    let mut r = rig(SensorSelect::Inner);
    record_frames(&mut r.reel, 2);

    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert!(r.reel.is_empty());
    assert!(r.manager.is_recording());
}

#[tokio::test]
async fn test_stop_recording_requires_recording() {
    let mut r = rig(SensorSelect::Inner);
    let t = r
        .manager
        .request_stop_recording(&mut r.device, &mut r.player, &r.reel, false)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::NotRecording));
    assert!(r.player.played().is_empty());
}

#[tokio::test]
async fn test_stop_recording_then_play() {
    let mut r = rig(SensorSelect::Inner);
    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    record_frames(&mut r.reel, 2);

    let t = r
        .manager
        .request_stop_recording(&mut r.device, &mut r.player, &r.reel, true)
        .await;
    assert_eq!(t, Transition::Applied);
    assert_eq!(r.manager.mode(), Mode::Playback);
    assert_eq!(r.manager.reel_cursor(), 0);
    assert_eq!(r.player.played(), &[Cue::RecordBegin, Cue::RecordEnd]);
}

#[tokio::test]
async fn test_playback_toggle() {
    let mut r = rig(SensorSelect::Inner);
    assert_eq!(
        r.manager.request_playback(&r.reel),
        Transition::Rejected(RejectReason::ReelEmpty)
    );

    record_frames(&mut r.reel, 3);
    assert_eq!(r.manager.request_playback(&r.reel), Transition::Applied);
    assert_eq!(r.manager.mode(), Mode::Playback);

    r.manager.advance_cursor();
    let t = r
        .manager
        .request_still_capture(&mut r.device, &mut r.player)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::Playback));

    assert_eq!(r.manager.request_playback(&r.reel), Transition::Applied);
    assert_eq!(r.manager.mode(), Mode::Idle);
    assert_eq!(r.manager.reel_cursor(), 0);
}

#[tokio::test]
async fn test_switch_sensor_guards() {
    let config = SnapcamConfig::default();
    let mut controller = CaptureController::new(&config.camera, &config.pipeline);
    let mut r = rig(SensorSelect::Inner);

    assert_eq!(
        r.manager.request_switch_sensor(&mut controller),
        Transition::Applied
    );
    assert!(controller.switch_requested());

    let mut controller = CaptureController::new(&config.camera, &config.pipeline);
    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(
        r.manager.request_switch_sensor(&mut controller),
        Transition::Rejected(RejectReason::Recording)
    );
    assert!(!controller.switch_requested());

    r.manager.sensor_switched(SensorSelect::Outer);
    assert!(r.manager.is_external_sensor());
}

#[tokio::test]
async fn test_reel_full_runs_epilogue_on_service() {
    let mut r = rig(SensorSelect::Outer);
    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    record_frames(&mut r.reel, 3);

    r.manager.mark_reel_full();
    assert_eq!(r.manager.mode(), Mode::Idle);
    assert!(r.manager.has_pending_epilogue());
    assert_eq!(r.device.led(), LedState::Blinking);

    let t = r
        .manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;
    assert_eq!(t, Transition::Rejected(RejectReason::Recording));

    let ended = r
        .manager
        .service(&mut r.device, &mut r.player, &r.reel)
        .await;
    assert_eq!(ended, Some(RecordingEnd::ReelFull));
    assert_eq!(r.device.led(), LedState::On);
    assert_eq!(r.player.played(), &[Cue::RecordBegin, Cue::RecordEnd]);
    assert_eq!(r.reel.len(), 3);

    let again = r
        .manager
        .service(&mut r.device, &mut r.player, &r.reel)
        .await;
    assert_eq!(again, None);
}

#[tokio::test]
async fn test_prepare_suspend_finishes_recording() {
    let mut r = rig(SensorSelect::Outer);
    r.player = SimulatedCuePlayer::new().with_play_polls(2);
    r.manager
        .request_start_recording(&mut r.device, &mut r.player, &mut r.reel)
        .await;

    let ended = r
        .manager
        .prepare_suspend(&mut r.device, &mut r.player, &r.reel)
        .await;
    assert_eq!(ended, Some(RecordingEnd::Suspended));
    assert_eq!(r.manager.mode(), Mode::Idle);
    assert_eq!(r.device.led(), LedState::On);
    assert!(!r.player.is_loaded());
    assert!(!r.player.is_playing());

    r.manager.resume(&mut r.player).unwrap();
    assert!(r.player.is_loaded());
}
