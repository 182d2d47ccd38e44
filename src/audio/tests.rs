use super::*;
use crate::config::SnapcamConfig;
use crate::error::AudioError;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_cue_bank_loads_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[1, 2, 3, 4, 5]).unwrap();

    let mut config = SnapcamConfig::default().audio;
    config.shutter_cue = Some(file.path().to_string_lossy().into_owned());

    let bank = CueBank::load(&config).unwrap();
    assert_eq!(bank.sample(Cue::Shutter).data, vec![1, 2, 3, 4, 5]);
    assert_eq!(bank.sample(Cue::Shutter).cue, Cue::Shutter);
    assert!(!bank.sample(Cue::RecordEnd).is_empty());
}

#[test]
fn test_cue_bank_missing_file() {
    let mut config = SnapcamConfig::default().audio;
    config.end_cue = Some("/nonexistent/end.wav".to_string());

    match CueBank::load(&config) {
        Err(AudioError::Load { path, .. }) => assert_eq!(path, "/nonexistent/end.wav"),
        other => panic!("expected load error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_play_until_accepted_retries() {
    let bank = CueBank::silent();
    let mut player = SimulatedCuePlayer::new().with_refusals(3);

    play_until_accepted(&mut player, bank.sample(Cue::Shutter), 10, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(player.attempts(), 4);
    assert_eq!(player.played(), &[Cue::Shutter]);
}

#[tokio::test]
async fn test_play_until_accepted_is_bounded() {
    let bank = CueBank::silent();
    let mut player = SimulatedCuePlayer::new().with_refusals(50);

    let result =
        play_until_accepted(&mut player, bank.sample(Cue::RecordBegin), 5, Duration::ZERO).await;
    assert!(matches!(
        result,
        Err(AudioError::CueRejected { attempts: 5, .. })
    ));
    assert!(player.played().is_empty());
}

#[tokio::test]
async fn test_wait_for_silence() {
    let bank = CueBank::silent();
    let mut player = SimulatedCuePlayer::new().with_play_polls(3);
    assert!(player.play_cue(bank.sample(Cue::RecordEnd)));

    assert!(wait_for_silence(&player, Duration::ZERO, Duration::from_secs(1)).await);
    assert!(!player.is_playing());
}

#[test]
fn test_unloaded_player_refuses() {
    let bank = CueBank::silent();
    let mut player = SimulatedCuePlayer::new();
    player.unload();
    assert!(!player.play_cue(bank.sample(Cue::Shutter)));

    player.reload().unwrap();
    assert!(player.play_cue(bank.sample(Cue::Shutter)));

    player.set_fail_reload(true);
    player.unload();
    assert!(player.reload().is_err());
    assert!(!player.is_loaded());
}
