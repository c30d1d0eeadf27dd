//! Performance benchmarks for the hot paths of a match
//!
//! Thresholds are deliberately loose; these catch accidental quadratic
//! behavior, not small regressions.

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::GameState;
use shared::codec::{decode, decode_message, encode_message};
use shared::{Balloon, BalloonPosition, Color, Message, PlayerScore};
use std::time::Instant;

fn busy_delta() -> Message {
    Message::StateDelta {
        tick: 1200,
        spawned: (0..5)
            .map(|id| Balloon::new(id, Color::ALL[id as usize % 4], 100.0, 80.0, 10.0, 90.0))
            .collect(),
        removed: (5..10).collect(),
        moved: (10..60)
            .map(|id| BalloonPosition {
                id,
                x: id as f32 * 10.0,
                y: 300.0,
            })
            .collect(),
        popped: vec![],
        scores: (1..=4)
            .map(|player_id| PlayerScore {
                player_id,
                color: Some(Color::ALL[player_id as usize - 1]),
                score: 7,
            })
            .collect(),
    }
}

fn running_game(players: u32) -> GameState {
    let mut game = GameState::new();
    for id in 1..=players {
        game.add_player(id).unwrap();
        game.assign_color(id, Color::ALL[id as usize - 1]).unwrap();
        game.set_ready(id).unwrap();
    }
    game.begin_game().unwrap();
    game.start_running().unwrap();
    game
}

/// Benchmarks framing and JSON encoding of a busy state delta
#[test]
fn benchmark_frame_encoding() {
    let message = busy_delta();
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = encode_message(&message).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Frame encoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Benchmarks decoding frames back into messages
#[test]
fn benchmark_frame_decoding() {
    let message = busy_delta();
    let frame = encode_message(&message).unwrap();
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let (payload, consumed) = decode(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        let _ = decode_message(payload).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Frame decoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_secs() < 5);
}

/// Benchmarks pop resolution, including the no-op path for repeat pops
#[test]
fn benchmark_pop_resolution() {
    let mut game = running_game(4);
    let mut rng = StdRng::seed_from_u64(42);
    let balloons: Vec<_> = (0..2_000)
        .map(|i| game.spawn_balloon(Color::ALL[i % 4], &mut rng).id)
        .collect();

    let start = Instant::now();
    let mut total = 0;
    for (i, balloon_id) in balloons.iter().enumerate() {
        let player_id = (i % 4) as u32 + 1;
        total += game.pop_balloon(*balloon_id, player_id).delta_score;
        // Second pop is always a no-op
        total += game.pop_balloon(*balloon_id, player_id).delta_score;
    }
    let duration = start.elapsed();

    println!(
        "Pop resolution: {} pops in {:?}",
        balloons.len() * 2,
        duration
    );
    assert_eq!(total, balloons.len() as i32);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full ticks with a crowded playfield
#[test]
fn benchmark_game_ticks() {
    let mut game = running_game(4);
    let mut rng = StdRng::seed_from_u64(7);
    let ticks = 2_000;
    let start = Instant::now();

    for _ in 0..ticks {
        game.maybe_spawn(1.0, &mut rng);
        let _ = game.step(0.016);
    }

    let duration = start.elapsed();
    println!(
        "Game ticks: {} ticks in {:?}, {} balloons alive",
        ticks,
        duration,
        game.balloon_count()
    );

    assert_eq!(game.tick, ticks);
    assert!(duration.as_secs() < 5);
}
