//! End-to-end playback scenarios against the scripted engine.
//!
//! Poll timing is shortened to milliseconds; poll counts and event
//! sequences are the same as with the default 100ms interval.

use std::time::Duration;

use player::engine::scripted::ScriptedEngine;
use player::{
    EngineState, Outcome, Phase, Player, PlayerConfig, PlayerError, PlayerEvent, Source, Status,
};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> PlayerConfig {
    PlayerConfig {
        poll_interval: Duration::from_millis(1),
        error_grace: Duration::from_millis(2),
        ..PlayerConfig::default()
    }
}

fn statuses(events: &[PlayerEvent]) -> Vec<Status> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::StatusChanged { status, .. } => Some(status.clone()),
            PlayerEvent::ErrorOccurred { .. } => None,
        })
        .collect()
}

#[test]
fn unreachable_stream_times_out_after_sixty_polls() {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    let connect = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .expect("play");
    let outcome = connect.wait().expect("outcome");

    let Outcome::Failed(error) = outcome else {
        panic!("expected timeout");
    };
    assert!(matches!(
        *error,
        PlayerError::ConnectTimeout { waited } if waited == Duration::from_millis(60)
    ));

    // 60 polls plus the final check.
    assert_eq!(probe.state_polls(), 61);

    let events: Vec<_> = rx.try_iter().collect();
    let statuses = statuses(&events);
    assert_eq!(statuses.first(), Some(&Status::Connecting));
    let progress: Vec<_> = statuses
        .iter()
        .filter_map(|s| match s {
            Status::StillConnecting { elapsed } => Some(elapsed.as_millis()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![10, 20, 30, 40, 50, 60]);
    assert!(events.last().unwrap().is_error());

    // Play control is available again for a retry.
    assert_eq!(player.phase(), Phase::Failed);
    assert!(player.phase().can_play());
}

#[test]
fn local_file_reaches_playing_after_two_polls() {
    let engine = ScriptedEngine::with_script([EngineState::Connecting, EngineState::Playing]);
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    let connect = player.play(&Source::classify("C:\\video.mp4")).unwrap();
    let outcome = connect.wait().unwrap();

    assert!(matches!(outcome, Outcome::Connected(Status::Playing)));
    assert_eq!(probe.state_polls(), 2);
    assert_eq!(probe.last_location().as_deref(), Some("C:\\video.mp4"));

    let events: Vec<_> = rx.try_iter().collect();
    assert!(!events.iter().any(PlayerEvent::is_error));
    assert_eq!(statuses(&events), vec![Status::Connecting, Status::Playing]);
    assert_eq!(player.phase(), Phase::Active);
}

#[test]
fn remote_stream_gets_tcp_and_connect_timeout() {
    let engine = ScriptedEngine::with_script([EngineState::Playing]);
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();

    player
        .play(&Source::classify("rtsp://camera.local/live"))
        .unwrap()
        .wait()
        .unwrap();

    let options: Vec<String> = probe.last_options().iter().map(ToString::to_string).collect();
    assert!(options.contains(&":rtsp-tcp".to_string()));
    assert!(options.contains(&":rtsp-timeout=5000".to_string()));
}

#[test]
fn local_file_gets_only_file_caching() {
    let engine = ScriptedEngine::with_script([EngineState::Playing]);
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();

    player
        .play(&Source::classify("/videos/clip.mkv"))
        .unwrap()
        .wait()
        .unwrap();

    let options: Vec<String> = probe.last_options().iter().map(ToString::to_string).collect();
    assert_eq!(options, vec![":file-caching=1000"]);
}

#[test]
fn replaying_keeps_exactly_one_media_handle() {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();
    let config = PlayerConfig {
        poll_interval: Duration::from_millis(5),
        ..fast_config()
    };
    let player = Player::new(engine, config).unwrap();
    let rx = player.events();

    player
        .engine()
        .unwrap()
        .set_script_for("C:\\video.mp4", [EngineState::Buffering, EngineState::Playing]);

    let first = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .unwrap();
    let second = player.play(&Source::classify("C:\\video.mp4")).unwrap();

    assert!(matches!(first.wait().unwrap(), Outcome::Cancelled));
    assert!(second.wait().unwrap().is_connected());

    assert_eq!(probe.media_created(), 2);
    assert_eq!(probe.live_media(), 1);

    // Once the second attempt has spoken, nothing from the first follows.
    let events: Vec<_> = rx.try_iter().collect();
    let first_new = events
        .iter()
        .position(|e| e.generation() == second_generation(&events))
        .unwrap();
    assert!(
        events[first_new..]
            .iter()
            .all(|e| e.generation() == second_generation(&events))
    );
    assert!(!events.iter().any(PlayerEvent::is_error));
}

fn second_generation(events: &[PlayerEvent]) -> u64 {
    events.iter().map(PlayerEvent::generation).max().unwrap()
}

#[test]
fn stop_without_session_only_reports_stopped() {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    player.stop();
    player.stop();

    let events: Vec<_> = rx.try_iter().collect();
    assert!(!events.iter().any(PlayerEvent::is_error));
    assert_eq!(statuses(&events), vec![Status::Stopped, Status::Stopped]);
    assert_eq!(probe.live_media(), 0);
    assert_eq!(player.phase(), Phase::Stopped);
}

#[test]
fn stop_releases_media_and_cancels_connect() {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();
    let config = PlayerConfig {
        poll_interval: Duration::from_millis(20),
        ..fast_config()
    };
    let player = Player::new(engine, config).unwrap();

    let connect = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .unwrap();
    player.stop();

    assert!(matches!(connect.wait().unwrap(), Outcome::Cancelled));
    assert_eq!(probe.live_media(), 0);
    assert_eq!(player.engine_state(), EngineState::Stopped);
}

#[test]
fn dispose_twice_releases_engine_once() {
    let engine = ScriptedEngine::with_script([EngineState::Playing]);
    let probe = engine.probe();
    let mut player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    player
        .play(&Source::classify("C:\\video.mp4"))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(probe.listeners(), 1);

    player.dispose();
    player.dispose();
    drop(player);

    assert_eq!(probe.engine_released(), 1);
    assert_eq!(probe.listeners(), 0);
    assert_eq!(probe.live_media(), 0);

    // Channel closes once the player is gone.
    let _ = rx.try_iter().count();
    assert!(rx.recv_timeout(WAIT).is_err());
}

#[test]
fn dispose_cancels_in_flight_connect() {
    let engine = ScriptedEngine::new();
    let probe = engine.probe();
    let config = PlayerConfig {
        poll_interval: Duration::from_millis(50),
        ..fast_config()
    };
    let mut player = Player::new(engine, config).unwrap();

    let connect = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .unwrap();
    player.dispose();

    assert!(matches!(connect.wait().unwrap(), Outcome::Cancelled));
    assert_eq!(probe.engine_released(), 1);
}

#[test]
fn failed_construction_releases_engine() {
    let engine = ScriptedEngine::new();
    engine.reject_subscribe(true);
    let probe = engine.probe();

    let result = Player::new(engine, fast_config());

    assert!(matches!(result, Err(PlayerError::Engine(_))));
    assert_eq!(probe.engine_released(), 1);
}

#[test]
fn rejected_play_reports_start_failure() {
    let engine = ScriptedEngine::new();
    engine.reject_play(true);
    let probe = engine.probe();
    let player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    let outcome = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .unwrap()
        .wait()
        .unwrap();

    let Outcome::Failed(error) = outcome else {
        panic!("expected failure");
    };
    assert!(matches!(*error, PlayerError::StartRejected(_)));
    assert!(!error.hints().is_empty());
    assert_eq!(probe.state_polls(), 0);

    let last = rx.recv_timeout(WAIT).and_then(|_| rx.recv_timeout(WAIT)).unwrap();
    assert!(last.is_error());
}

#[test]
fn stream_error_after_grace_is_reported() {
    let engine = ScriptedEngine::with_script([EngineState::Error]);
    let player = Player::new(engine, fast_config()).unwrap();
    let rx = player.events();

    let outcome = player
        .play(&Source::classify("rtsp://192.0.2.1/stream"))
        .unwrap()
        .wait()
        .unwrap();

    assert!(matches!(outcome, Outcome::Failed(ref e) if matches!(**e, PlayerError::Stream(_))));
    let errors = rx.try_iter().filter(PlayerEvent::is_error).count();
    assert_eq!(errors, 1);
}

#[test]
fn validation_rejects_before_play() {
    let err = Source::parse("not-a-url").unwrap_err();
    assert!(matches!(err, PlayerError::InvalidSource { .. }));
}
