use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rumble_lib::announce::{Announcement, RecordingSink};
use rumble_lib::collector::{Actor, Signal, SignalKind, DEFAULT_JOIN_EMOJI};
use rumble_lib::commands::StartRequest;
use rumble_lib::engine::Dice;
use rumble_lib::ledger::{MemoryLedger, PointStore};
use rumble_lib::session::{run_session, Collaborators, Pacing, SessionConfig, SessionOutcome};
use tokio::sync::mpsc;

const PLAYERS: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Plays back fixed batch sizes and saves, then falls back to a seeded rng.
struct Scripted {
    batches: VecDeque<usize>,
    saves: VecDeque<bool>,
    rng: ChaCha20Rng,
}

impl Dice for Scripted {
    fn batch_size(&mut self, min: usize, max: usize) -> usize {
        self.batches
            .pop_front()
            .unwrap_or_else(|| self.rng.gen_range(min..=max))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    fn saved(&mut self, chance: f64) -> bool {
        self.saves
            .pop_front()
            .unwrap_or_else(|| self.rng.gen_bool(chance))
    }
}

fn join(id: &str) -> Signal {
    Signal {
        actor: Actor {
            id: id.to_string(),
            name: format!("Fighter {id}"),
            bot: false,
            roles: HashSet::from(["42".to_string()]),
        },
        kind: SignalKind::Reaction {
            emoji: DEFAULT_JOIN_EMOJI.to_string(),
        },
        at_ms: 0,
    }
}

fn config(reward_points: Option<&str>) -> SessionConfig {
    SessionConfig::from_request(&StartRequest {
        duration_secs: 60,
        roles: "<@&42>".to_string(),
        track: Some("Thunderdome".to_string()),
        reward_role: None,
        reward_points: reward_points.map(str::to_string),
    })
    .unwrap()
}

async fn play(reward_points: Option<&str>) -> (SessionOutcome, Vec<Announcement>, Arc<MemoryLedger>) {
    let (tx, mut rx) = mpsc::channel(16);
    for id in PLAYERS {
        tx.send(join(id)).await.unwrap();
    }
    // A repeat join changes nothing.
    tx.send(join("A")).await.unwrap();

    let sink = Arc::new(RecordingSink::new());
    let ledger = Arc::new(MemoryLedger::new());
    ledger.credit("bystander", 5).unwrap();
    let collaborators = Collaborators {
        sink: sink.clone(),
        granter: sink.clone(),
        ledger: ledger.clone(),
    };
    let mut dice = Scripted {
        batches: VecDeque::from([3]),
        saves: VecDeque::from([false, true, false]),
        rng: ChaCha20Rng::seed_from_u64(2024),
    };

    let outcome = run_session(
        &config(reward_points),
        Pacing {
            round_delay: Duration::from_secs(6),
            reminder_every: Duration::ZERO,
        },
        DEFAULT_JOIN_EMOJI,
        &mut rx,
        &mut dice,
        &collaborators,
    )
    .await;
    (outcome, sink.announcements(), ledger)
}

#[tokio::test(start_paused = true)]
async fn five_player_rumble_rewards_winner() {
    let (outcome, announcements, ledger) = play(Some("50")).await;

    let Some(Announcement::RoundStart { roster, track }) = announcements.first() else {
        panic!("expected the round start first, got {announcements:?}");
    };
    let ids: Vec<&str> = roster.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, PLAYERS);
    assert_eq!(track, "Thunderdome");

    let Some(Announcement::Eliminations {
        round,
        eliminated,
        remaining,
    }) = announcements.get(1)
    else {
        panic!("expected the first round, got {announcements:?}");
    };
    assert_eq!(*round, 1);
    assert_eq!(eliminated.len(), 2);
    assert_eq!(*remaining, 3);

    let SessionOutcome::Won { winner, rounds, balance } = outcome else {
        panic!("expected a winner");
    };
    assert!(PLAYERS.contains(&winner.id.as_str()));
    assert!(rounds >= 2);
    assert_eq!(balance, Some(50));
    assert_eq!(ledger.get(&winner.id), 50);
    assert_eq!(ledger.get("bystander"), 5);
    assert_eq!(
        announcements.last(),
        Some(&Announcement::Winner { participant: winner })
    );
}

#[tokio::test(start_paused = true)]
async fn rumble_without_reward_leaves_points_alone() {
    let (outcome, _announcements, ledger) = play(Some("fifty")).await;

    let SessionOutcome::Won { winner, balance, .. } = outcome else {
        panic!("expected a winner");
    };
    assert_eq!(balance, None);
    assert_eq!(ledger.get(&winner.id), 0);
    assert_eq!(ledger.rank(), vec![("bystander".to_string(), 5)]);
}

#[tokio::test(start_paused = true)]
async fn every_round_is_reported_even_when_everyone_is_saved() {
    let (tx, mut rx) = mpsc::channel(4);
    tx.send(join("A")).await.unwrap();
    tx.send(join("B")).await.unwrap();
    drop(tx);

    let sink = Arc::new(RecordingSink::new());
    let collaborators = Collaborators {
        sink: sink.clone(),
        granter: sink.clone(),
        ledger: Arc::new(MemoryLedger::new()),
    };
    let mut dice = Scripted {
        batches: VecDeque::new(),
        saves: VecDeque::from([true, true, false]),
        rng: ChaCha20Rng::seed_from_u64(1),
    };

    let outcome = run_session(
        &config(None),
        Pacing::instant(),
        DEFAULT_JOIN_EMOJI,
        &mut rx,
        &mut dice,
        &collaborators,
    )
    .await;

    assert!(matches!(outcome, SessionOutcome::Won { rounds: 3, .. }));
    let rounds: Vec<(u32, usize)> = sink
        .announcements()
        .into_iter()
        .filter_map(|a| match a {
            Announcement::Eliminations { round, eliminated, .. } => Some((round, eliminated.len())),
            _ => None,
        })
        .collect();
    assert_eq!(rounds, vec![(1, 0), (2, 0), (3, 1)]);
}
