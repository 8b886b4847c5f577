//! End-to-end tests over synthetic replay files.

mod common;

use std::ops::ControlFlow;

use common::*;
use rl_replay_parser::analysis::Subject;
use rl_replay_parser::error::ParserError;
use rl_replay_parser::network::{ActorId, DecodeOptions, DecodeProgress, Value};
use rl_replay_parser::replay::{ParseOptions, ParsedReplay, ReplaySections};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_parse_sections() {
    let data = match_replay(&[2]).build();
    let sections = ReplaySections::parse(&data).unwrap();

    assert_eq!(sections.preamble.crc, "1234abcd");
    assert_eq!(sections.preamble.version, "868.20");
    assert_eq!(sections.header.game_type, "TAGame.Replay_Soccar_TA");
    assert_eq!(sections.header.num_frames().unwrap(), 4);
    assert_eq!(sections.header.goal_frames().unwrap(), vec![2]);
    assert_eq!(sections.meta.objects.len(), 7);
    assert_eq!(sections.meta.net_cache.len(), 6);
    assert_eq!(sections.meta.maps, vec!["Stadium_P".to_string()]);
}

#[test]
fn test_parse_full_replay() {
    let data = match_replay(&[2]).build();
    let replay = ParsedReplay::parse(&data).unwrap();

    assert_eq!(replay.frames.len(), 4);
    assert_eq!(replay.net_cache.len(), 6);
    for pair in replay.frames.windows(2) {
        assert!(pair[0].current_time <= pair[1].current_time);
    }
    assert!(replay.frames[2].is_empty());

    let alice = &replay.frames[0].touched_actors[&ActorId(1)];
    assert_eq!(
        alice.property("Engine.PlayerReplicationInfo:PlayerName"),
        Some(&Value::String("Alice".into()))
    );
    assert_eq!(
        alice
            .property("Engine.PlayerReplicationInfo:Team")
            .and_then(Value::as_actor_ref),
        Some(ActorId(7))
    );

    let car = &replay.frames[1].touched_actors[&ActorId(2)];
    assert_eq!(car.class_name, "TAGame.Car_Season_TA");
    let position = car
        .property("TAGame.RBActor_TA:ReplicatedRBState")
        .and_then(Value::as_position)
        .unwrap();
    assert_eq!((position.x, position.y, position.z), (100.0, 0.0, 17.0));
}

#[test]
fn test_parse_with_progress() {
    let data = match_replay(&[]).build();
    let mut seen = Vec::new();
    let mut observer = |p: DecodeProgress| {
        seen.push(p.frames_done);
        ControlFlow::Continue(())
    };
    let options = ParseOptions {
        decode: DecodeOptions {
            progress_interval: 1,
        },
        ..ParseOptions::default()
    };
    let replay = ParsedReplay::parse_with(&data, options, &mut observer).unwrap();

    assert_eq!(replay.frames.len(), 4);
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn test_cancelled_parse() {
    let data = match_replay(&[]).build();
    let mut observer = |p: DecodeProgress| {
        if p.frames_done == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let options = ParseOptions {
        decode: DecodeOptions {
            progress_interval: 1,
        },
        ..ParseOptions::default()
    };
    let result = ParsedReplay::parse_with(&data, options, &mut observer);
    assert!(matches!(result, Err(ParserError::Cancelled { frame: 3 })));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_trailing_meta_data() {
    let mut builder = match_replay(&[]);
    builder.trailing = vec![0xAA, 0xBB];
    let data = builder.build();

    match ReplaySections::parse(&data) {
        Err(ParserError::TrailingMetaData { consumed, total }) => {
            assert_eq!(total - consumed, 2);
        }
        other => panic!("Expected TrailingMetaData, got {other:?}"),
    }
}

#[test]
fn test_trailing_netstream_data() {
    let mut builder = match_replay(&[]);
    builder.netstream.push(0x01);
    let data = builder.build();

    assert!(matches!(
        ParsedReplay::parse(&data),
        Err(ParserError::TrailingNetstreamData { .. })
    ));
}

#[test]
fn test_stream_shorter_than_frame_count() {
    let mut builder = match_replay(&[]);
    builder.header = match_header(5, &[]);
    let data = builder.build();

    match ParsedReplay::parse(&data) {
        Err(err @ ParserError::FrameDecodeFailed { frame: 4, .. }) => {
            assert!(matches!(
                err.root_cause(),
                ParserError::UnexpectedEndOfStream { .. }
            ));
            if let ParserError::FrameDecodeFailed { last_actors, .. } = &err {
                assert_eq!(last_actors.len(), 3);
            }
        }
        other => panic!("Expected FrameDecodeFailed at frame 4, got {other:?}"),
    }
}

#[test]
fn test_missing_frame_count() {
    let mut builder = match_replay(&[]);
    let mut header = ByteWriter::default();
    header.string("TAGame.Replay_Soccar_TA").string("None");
    builder.header = header.bytes;
    let data = builder.build();

    assert!(matches!(
        ParsedReplay::parse(&data),
        Err(ParserError::MissingHeaderProperty { ref name }) if name == "NumFrames"
    ));
}

#[test]
fn test_truncated_file() {
    let data = match_replay(&[]).build();
    assert!(matches!(
        ReplaySections::parse(&data[..data.len() - 10]),
        Err(ParserError::UnexpectedEof { .. })
    ));
    assert!(matches!(
        ReplaySections::parse(&data[..12]),
        Err(ParserError::UnexpectedEof { .. })
    ));
}

#[test]
fn test_unknown_archetype_class() {
    let mut builder = match_replay(&[]);
    // drop the replication-info class so its archetype cannot resolve
    builder.net_cache.pop();
    let data = builder.build();

    match ParsedReplay::parse(&data) {
        Err(err @ ParserError::FrameDecodeFailed { frame: 0, .. }) => {
            assert!(matches!(
                err.root_cause(),
                ParserError::UnknownClass { class_name } if class_name == ".Default__PRI_TA"
            ));
        }
        other => panic!("Expected FrameDecodeFailed at frame 0, got {other:?}"),
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[test]
fn test_players() {
    let data = match_replay(&[2]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let alice = analyser.player("Alice").unwrap();
    assert_eq!(alice.team, 0);
    assert_eq!(alice.actor_ids, vec![ActorId(1)]);
    assert!(matches!(
        analyser.player("Bob"),
        Err(ParserError::UnknownPlayer { .. })
    ));
}

#[test]
fn test_ball_trajectory() {
    let data = match_replay(&[2]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let whole = analyser.get_actor_pos(&Subject::Ball, false).unwrap();
    assert_eq!(whole.len(), 1);
    assert_eq!((whole[0].frame_start, whole[0].frame_end), (0, 3));
    let xs: Vec<f32> = whole[0].positions.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 10.0, 10.0]);

    let sliced = analyser.get_actor_pos(&Subject::Ball, true).unwrap();
    let bounds: Vec<(usize, usize)> = sliced.iter().map(|s| (s.frame_start, s.frame_end)).collect();
    assert_eq!(bounds, vec![(0, 2), (2, 3)]);
    assert_eq!(sliced[0].positions.len(), 2);
    assert_eq!(sliced[1].positions.len(), 1);
    assert_close(sliced[1].time_start, 0.2);
}

#[test]
fn test_player_trajectory_follows_car() {
    let data = match_replay(&[]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let segments = analyser
        .get_actor_pos(&Subject::from("Alice"), false)
        .unwrap();
    assert_eq!(segments.len(), 1);
    let segment = &segments[0];
    assert_eq!(segment.subject, "Alice");
    assert_eq!((segment.frame_start, segment.frame_end), (1, 3));
    let xs: Vec<f32> = segment.positions.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![100.0, 100.0]);
}

#[test]
fn test_distance_to_ball() {
    let data = match_replay(&[]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let series = analyser
        .distance(&Subject::from("Alice"), Some(&Subject::Ball))
        .unwrap()
        .unwrap();
    assert_eq!(series.len(), 2);
    let expected = (90.0f64 * 90.0 + 76.0 * 76.0).sqrt();
    for d in &series.distance {
        assert_close(*d, expected);
    }
    assert_close(series.time[0], 0.1);
    assert_close(series.time[1], 0.3);

    let from_origin = analyser.distance(&Subject::Ball, None).unwrap().unwrap();
    assert_eq!(from_origin.len(), 3);
    assert_close(from_origin.distance[0], 93.0);
}

#[test]
fn test_trajectories_for_several_subjects() {
    let data = match_replay(&[2]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let all = analyser
        .trajectories(&[Subject::Ball, Subject::from("Alice")], true)
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["Ball"].len(), 2);
    assert_eq!(all["Alice"].len(), 2);

    assert!(analyser
        .trajectories(&[Subject::Ball, Subject::from("Nobody")], false)
        .is_err());
}

#[test]
fn test_components_for_plotting() {
    let data = match_replay(&[]).build();
    let replay = ParsedReplay::parse(&data).unwrap();
    let analyser = replay.analyser().unwrap();

    let segment = analyser
        .get_actor_pos(&Subject::Ball, false)
        .unwrap()
        .remove(0);
    let components = segment.components();
    assert_eq!(components.x, vec![0.0, 10.0, 10.0]);
    assert_eq!(components.z, vec![93.0, 93.0, 93.0]);
    assert_eq!(components.title_short, "Ball [0 - 0]");
    assert_eq!(components.title, "Ball From: 0s To: 0s");
}

// ============================================================================
// Channel reuse
// ============================================================================

fn spawn_player(w: &mut BitWriter, id: u32, name: &str, team: i32) {
    w.spawn(id, PRI);
    w.update(id)
        .property(0, 1)
        .string(name)
        .property(1, 1)
        .actor_ref(team)
        .end_update();
}

fn car_claimed_by(w: &mut BitWriter, car: u32, player: i32, x: i32) {
    w.spawn(car, CAR).vector(x, 0, 17).rotation(None, None, None);
    w.update(car)
        .property(1, 1)
        .actor_ref(player)
        .property(0, 1)
        .rigid_body(x, 0, 17)
        .end_update();
}

#[test]
fn test_reused_car_channel_switches_owner() {
    let mut w = BitWriter::default();
    w.frame_start(0.0, 0.0);
    spawn_player(&mut w, 1, "Alice", 7);
    spawn_player(&mut w, 3, "Bob", 8);
    w.frame_end();

    w.frame_start(0.1, 0.1);
    car_claimed_by(&mut w, 2, 1, 100);
    w.frame_end();

    w.frame_start(0.2, 0.1);
    w.destroy(2);
    w.frame_end();

    w.frame_start(0.3, 0.1);
    car_claimed_by(&mut w, 2, 3, 999);
    w.frame_end();

    w.frame_start(0.4, 0.1);
    w.update(2).property(0, 1).rigid_body(999, 0, 17).end_update();
    w.frame_end();

    let mut builder = match_replay(&[]);
    builder.header = match_header(5, &[]);
    builder.netstream = w.finish();
    let data = builder.build();

    let replay = ParsedReplay::parse(&data).unwrap();
    assert_eq!(replay.frames.len(), 5);
    let analyser = replay.analyser().unwrap();
    assert_eq!(analyser.players().len(), 2);

    let alice = analyser.get_actor_pos(&Subject::from("Alice"), false).unwrap();
    assert_eq!((alice[0].frame_start, alice[0].frame_end), (1, 4));
    let xs: Vec<f32> = alice[0].positions.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![100.0, 100.0, 100.0]);

    let bob = analyser.get_actor_pos(&Subject::from("Bob"), false).unwrap();
    assert_eq!((bob[0].frame_start, bob[0].frame_end), (3, 4));
    let xs: Vec<f32> = bob[0].positions.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![999.0]);
}

#[test]
fn test_unmapped_wire_id_fails_parse() {
    let mut builder = match_replay(&[]);
    // replication info declares wire ids 0 and 2 only
    if let Some(entry) = builder.net_cache.last_mut() {
        entry.3 = vec![(PLAYER_NAME, 0), (TEAM, 2)];
    }
    let mut w = BitWriter::default();
    w.frame_start(0.0, 0.0);
    w.spawn(1, PRI);
    w.update(1).property(1, 2);
    builder.netstream = w.finish();
    let data = builder.build();

    match ParsedReplay::parse(&data) {
        Err(err @ ParserError::FrameDecodeFailed { frame: 0, .. }) => {
            assert!(matches!(
                err.root_cause(),
                ParserError::UnmappedProperty { prop_id: 1, archetype }
                    if archetype == "TAGame.Default__PRI_TA"
            ));
        }
        other => panic!("Expected FrameDecodeFailed at frame 0, got {other:?}"),
    }
}
