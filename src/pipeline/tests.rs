use super::*;
use crate::audio::{Cue, CuePlayer, SimulatedCuePlayer};
use crate::config::SnapcamConfig;
use crate::device::{Interrupt, LedState, SensorSelect, SimulatedDevice};
use crate::display::{RecordingSurface, Screen};
use crate::error::{DeviceError, SnapcamError};
use crate::events::{EventFilter, EventReceiver, PipelineEvent};
use crate::mode::{Mode, RecordingEnd, RejectReason, Transition};

type TestPipeline = Pipeline<SimulatedDevice, SimulatedCuePlayer, RecordingSurface>;

fn test_config() -> SnapcamConfig {
    let mut config = SnapcamConfig::default();
    config.camera.width = 64;
    config.camera.height = 48;
    config.pipeline.init_retry_base_ms = 0;
    config.pipeline.busy_poll_interval_ms = 0;
    config.pipeline.busy_timeout_ms = 50;
    config.audio.shutter_delay_ms = 0;
    config.audio.cue_retry_interval_ms = 0;
    config.audio.drain_poll_ms = 0;
    // 12 frames of budget, 2 held back
    config.reel.memory_budget_bytes = (64 * 48 * 2 * 12) as u64;
    config.reel.reserve_frames = 2;
    config
}

fn pipeline_with(config: SnapcamConfig, device: SimulatedDevice) -> TestPipeline {
    Pipeline::new(
        config,
        device,
        SimulatedCuePlayer::new(),
        RecordingSurface::new(),
    )
    .unwrap()
}

async fn running(config: SnapcamConfig) -> TestPipeline {
    let mut pipeline = pipeline_with(config, SimulatedDevice::new());
    pipeline.start().await.unwrap();
    pipeline
}

/// One sensor period with all of its interrupts handled
fn frame(pipeline: &mut TestPipeline) {
    pipeline.device_mut().advance_frame();
    pipeline.drain_interrupts().unwrap();
}

/// Frame then display tick until the first frame reaches the screen
fn stabilize(pipeline: &mut TestPipeline) {
    for _ in 0..40 {
        frame(pipeline);
        if pipeline.on_display_tick().unwrap().presented.is_some() {
            return;
        }
    }
    panic!("pipeline never presented a frame");
}

fn events(pipeline: &TestPipeline) -> EventReceiver {
    EventReceiver::new(pipeline.events().subscribe(), EventFilter::All, "test")
}

#[tokio::test]
async fn test_end_to_end_first_presentation() {
    let mut pipeline = running(SnapcamConfig::default()).await;

    let status = pipeline.status();
    assert_eq!(status.write_index, 0);
    assert_eq!(status.read_index, 1);
    assert!(status.pending_recapture);
    assert_eq!(status.state, PipelineState::Running);

    // recapture, then warm-up into slot 0 until the count saturates
    for _ in 0..32 {
        frame(&mut pipeline);
        assert_eq!(pipeline.on_display_tick().unwrap().presented, None);
    }
    let status = pipeline.status();
    assert_eq!(status.stabilized_count, 32);
    assert_eq!(status.write_index, 0);
    assert!(!status.pending_recapture);

    frame(&mut pipeline);
    assert_eq!(pipeline.controller().write_index(), 1);

    let outcome = pipeline.on_display_tick().unwrap();
    assert_eq!(outcome.presented, Some(0));
    assert_eq!(pipeline.display().read_index(), 0);
    let shown = pipeline.surface().last(Screen::Live).unwrap();
    assert_eq!(
        shown.first_pixel,
        SimulatedDevice::frame_pixel(33, SensorSelect::Inner)
    );
    assert!(shown.uniform);
}

#[tokio::test]
async fn test_presented_frame_is_never_being_filled() {
    let mut config = test_config();
    config.simulation.buffer_error_interval = 13;
    config.simulation.reboot_interval = 29;
    let mut pipeline = pipeline_with(config.clone(), SimulatedDevice::with_faults(config.simulation));
    pipeline.start().await.unwrap();

    for n in 0..400u32 {
        // uneven interleaving: sometimes two frames land between ticks
        frame(&mut pipeline);
        if n % 7 == 0 {
            frame(&mut pipeline);
        }
        if n % 11 == 3 {
            pipeline.device_mut().set_transfer_stuck(true);
        }

        let outcome = pipeline.on_display_tick().unwrap();
        if let Some(slot) = outcome.presented {
            if let Some(in_flight) = pipeline.controller().in_flight() {
                assert_ne!(in_flight.slot, slot);
            }
        }
    }

    assert!(pipeline.surface().frames(Screen::Live) > 0);
    assert!(pipeline.surface().history().all(|p| p.uniform));
    assert!(pipeline.controller().stats().desyncs > 0);
    assert!(pipeline.controller().stats().buffer_errors > 0);
}

#[tokio::test]
async fn test_promoted_frame_shown_on_next_tick() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);

    for _ in 0..50 {
        let before = pipeline.controller().stats().promotions;
        frame(&mut pipeline);
        let produced = pipeline.device().frames_produced();
        let outcome = pipeline.on_display_tick().unwrap();

        if pipeline.controller().stats().promotions > before {
            assert!(outcome.presented.is_some());
            assert_eq!(
                pipeline.surface().last(Screen::Live).unwrap().first_pixel,
                SimulatedDevice::frame_pixel(produced, SensorSelect::Inner)
            );
        }
    }
}

#[tokio::test]
async fn test_reel_capacity_boundary() {
    let mut config = test_config();
    config.reel.memory_budget_bytes = (64 * 48 * 2 * 102) as u64;
    let mut pipeline = running(config).await;
    assert_eq!(pipeline.reel().capacity(), 100);
    stabilize(&mut pipeline);
    let mut rx = events(&pipeline);

    let t = pipeline.handle_input(Button::RecordToggle).await.unwrap();
    assert_eq!(t, Transition::Applied);

    let mut ticks = 0;
    while pipeline.mode().mode() == Mode::Recording {
        frame(&mut pipeline);
        pipeline.on_display_tick().unwrap();
        ticks += 1;
        assert!(ticks < 500, "recording never stopped");
    }

    assert_eq!(pipeline.reel().len(), 100);
    assert_eq!(pipeline.mode().mode(), Mode::Idle);

    // further frames are not archived
    frame(&mut pipeline);
    pipeline.on_display_tick().unwrap();
    assert_eq!(pipeline.reel().len(), 100);

    pipeline.service().await.unwrap();
    assert_eq!(pipeline.player().played(), &[Cue::RecordBegin, Cue::RecordEnd]);

    let stopped: Vec<_> = rx
        .drain()
        .into_iter()
        .filter(|e| e.event_type() == "recording_stopped")
        .collect();
    assert_eq!(stopped.len(), 1);
    assert!(matches!(
        stopped[0],
        PipelineEvent::RecordingStopped {
            reason: RecordingEnd::ReelFull,
            frames: 100,
            session: Some(_),
        }
    ));
}

#[tokio::test]
async fn test_still_and_recording_exclusive_via_buttons() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);

    assert!(pipeline.handle_input(Button::Shutter).await.unwrap().is_applied());
    assert_eq!(
        pipeline.handle_input(Button::RecordToggle).await.unwrap(),
        Transition::Rejected(RejectReason::StillPending)
    );

    let outcome = pipeline.on_display_tick().unwrap();
    assert!(outcome.still_captured);
    pipeline.service().await.unwrap();
    assert_eq!(pipeline.mode().mode(), Mode::Idle);
    let review = pipeline.surface().last(Screen::Review).unwrap();
    assert_eq!(review.first_pixel, pipeline.buffers().snapshot()[0]);

    assert!(pipeline
        .handle_input(Button::RecordToggle)
        .await
        .unwrap()
        .is_applied());
    assert_eq!(
        pipeline.handle_input(Button::Shutter).await.unwrap(),
        Transition::Rejected(RejectReason::Recording)
    );
    assert!(pipeline
        .handle_input(Button::RecordToggle)
        .await
        .unwrap()
        .is_applied());
    assert_eq!(pipeline.mode().mode(), Mode::Idle);
}

#[tokio::test]
async fn test_sensor_switch_waits_for_display_tick() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);

    let t = pipeline.handle_input(Button::SwitchSensor).await.unwrap();
    assert!(t.is_applied());
    for _ in 0..3 {
        frame(&mut pipeline);
    }
    assert_eq!(pipeline.device().active_sensor(), SensorSelect::Inner);
    assert!(pipeline.controller().is_stabilized());

    pipeline.on_display_tick().unwrap();
    assert_eq!(pipeline.device().active_sensor(), SensorSelect::Outer);
    assert_eq!(pipeline.controller().sensor(), SensorSelect::Outer);
    assert_eq!(pipeline.controller().stabilized_count(), 0);
    assert!(pipeline.mode().is_external_sensor());

    // nothing new is shown until the outer sensor settles
    let read_before = pipeline.display().read_index();
    for _ in 0..5 {
        frame(&mut pipeline);
        assert_eq!(pipeline.on_display_tick().unwrap().presented, None);
    }
    assert_eq!(pipeline.display().read_index(), read_before);
}

#[tokio::test]
async fn test_playback_toggle_after_recording() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);

    assert_eq!(
        pipeline.handle_input(Button::PlaybackToggle).await.unwrap(),
        Transition::Rejected(RejectReason::ReelEmpty)
    );

    pipeline.request_start_recording().await;
    for _ in 0..4 {
        frame(&mut pipeline);
        pipeline.on_display_tick().unwrap();
    }
    assert_eq!(pipeline.reel().len(), 4);
    pipeline.request_stop_recording(false).await;

    assert!(pipeline.request_playback().is_applied());
    assert_eq!(
        pipeline.handle_input(Button::SwitchSensor).await.unwrap(),
        Transition::Rejected(RejectReason::Playback)
    );

    let mut finished = false;
    for _ in 0..40 {
        frame(&mut pipeline);
        if pipeline.on_display_tick().unwrap().playback_finished {
            finished = true;
            break;
        }
    }
    assert!(finished);
    assert_eq!(pipeline.surface().frames(Screen::Review), 4);
    assert_eq!(pipeline.mode().mode(), Mode::Idle);
}

#[tokio::test]
async fn test_suspend_ordering_and_resume() {
    let mut config = test_config();
    config.camera.sensor = SensorSelect::Outer;
    let mut pipeline = running(config).await;
    stabilize(&mut pipeline);
    let mut rx = events(&pipeline);

    pipeline.request_start_recording().await;
    frame(&mut pipeline);
    pipeline.on_display_tick().unwrap();
    pipeline.device_mut().set_stop_latency(5);

    pipeline.handle_input(Button::StandbyToggle).await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Suspended);
    assert_eq!(pipeline.mode().mode(), Mode::Idle);
    assert!(!pipeline.player().is_loaded());
    assert_eq!(pipeline.device().active_sensor(), SensorSelect::None);
    assert!(!pipeline.device().is_capturing());
    assert_eq!(pipeline.device().armed(), None);
    assert_eq!(pipeline.device().led(), LedState::On);
    assert!(pipeline.controller().pending_recapture());

    let order: Vec<&'static str> = rx.drain().iter().map(|e| e.event_type()).collect();
    let stopped = order.iter().position(|e| *e == "recording_stopped").unwrap();
    let suspended = order.iter().position(|e| *e == "suspended").unwrap();
    assert!(stopped < suspended);

    assert_eq!(
        pipeline.handle_input(Button::Shutter).await.unwrap(),
        Transition::Rejected(RejectReason::Suspended)
    );
    assert_eq!(pipeline.on_display_tick().unwrap().presented, None);

    pipeline.handle_input(Button::StandbyToggle).await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert!(pipeline.player().is_loaded());
    assert!(pipeline.device().is_capturing());
    assert_eq!(pipeline.device().active_sensor(), SensorSelect::Outer);
    assert_eq!(pipeline.controller().stabilized_count(), 0);

    stabilize(&mut pipeline);
}

#[tokio::test]
async fn test_suspend_busy_timeout_keeps_running() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);
    pipeline.device_mut().set_never_settles(true);

    let result = pipeline.suspend().await;
    assert!(matches!(
        result,
        Err(SnapcamError::Device(DeviceError::Timeout { .. }))
    ));
    assert!(result.unwrap_err().is_recoverable());
    assert_eq!(pipeline.state(), PipelineState::Running);
    assert!(pipeline.player().is_loaded());
    assert!(pipeline.device().is_capturing());
    assert!(pipeline.controller().pending_recapture());

    pipeline.device_mut().set_never_settles(false);
    frame(&mut pipeline);
    assert!(!pipeline.controller().pending_recapture());
}

#[tokio::test]
async fn test_fatal_reboot_halts_pipeline() {
    let mut pipeline = running(test_config()).await;
    let mut rx = events(&pipeline);
    frame(&mut pipeline);

    pipeline
        .device()
        .raise(Interrupt::RebootComplete(Err(DeviceError::Fatal {
            operation: "reboot",
        })));
    let result = pipeline.drain_interrupts();
    assert!(result.is_err());
    assert!(!result.unwrap_err().is_recoverable());
    assert_eq!(pipeline.state(), PipelineState::Halted);
    assert!(!pipeline.device().is_capturing());

    assert_eq!(
        pipeline.handle_input(Button::Shutter).await.unwrap(),
        Transition::Rejected(RejectReason::Halted)
    );
    assert!(rx
        .drain()
        .iter()
        .any(|e| e.event_type() == "fatal_error"));

    pipeline.shutdown().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[tokio::test]
async fn test_fatal_sensor_switch_stops_device() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);
    let mut rx = events(&pipeline);

    pipeline.handle_input(Button::SwitchSensor).await.unwrap();
    pipeline
        .device_mut()
        .script_failure("activate", DeviceError::Fatal { operation: "activate" });

    assert!(pipeline.on_display_tick().is_err());
    assert_eq!(pipeline.state(), PipelineState::Halted);
    assert!(pipeline.controller().is_halted());
    assert!(!pipeline.controller().is_running());
    assert!(!pipeline.device().is_capturing());
    assert_eq!(pipeline.device().armed(), None);
    assert!(rx
        .drain()
        .iter()
        .any(|e| e.event_type() == "fatal_error"));

    // late frames from the sensor change nothing
    pipeline.device_mut().advance_frame();
    pipeline.drain_interrupts().ok();
    assert_eq!(pipeline.device().armed(), None);

    pipeline.shutdown().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(!pipeline.device().is_capturing());
    assert_eq!(pipeline.device().armed(), None);
}

#[tokio::test]
async fn test_start_fails_on_fatal_init() {
    let mut device = SimulatedDevice::new();
    device.script_failure("initialize", DeviceError::Fatal { operation: "initialize" });
    let mut pipeline = pipeline_with(test_config(), device);

    assert!(pipeline.start().await.is_err());
    assert_eq!(pipeline.state(), PipelineState::Halted);
}

#[tokio::test]
async fn test_shutdown_closes_recording() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);
    pipeline.request_start_recording().await;

    pipeline.shutdown().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(!pipeline.device().is_capturing());
    assert_eq!(pipeline.player().played().last(), Some(&Cue::RecordEnd));
    assert!(!pipeline.player().is_playing());
}

#[tokio::test]
async fn test_status_report() {
    let mut pipeline = running(test_config()).await;
    stabilize(&mut pipeline);

    let status = pipeline.status();
    assert!(status.stabilized);
    assert_eq!(status.reel_capacity, 10);
    let report = status.to_string();
    assert!(report.starts_with(&format!(
        "Capture to slot {}, display from slot {}",
        status.write_index, status.read_index
    )));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "running");
    assert_eq!(json["sensor"], "inner");
    assert!(json["capture"]["promotions"].as_u64().unwrap() >= 1);

    assert!(pipeline
        .handle_input(Button::DebugReport)
        .await
        .unwrap()
        .is_applied());
}
