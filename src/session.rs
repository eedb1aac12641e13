//! One rumble from the enrollment window to the winner's reward.

use std::sync::Arc;
use std::time::Duration;

use crate::announce::{AnnouncementSink, RoleGranter};
use crate::collector::{parse_role_id, AllowedRoles, Collector, SignalSource, MAX_WINDOW};
use crate::commands::StartRequest;
use crate::engine::{Dice, RumbleEngine};
use crate::ledger::PointStore;
use crate::roster::{Participant, Roster};

pub const DEFAULT_TRACK: &str = "Classic Arena";
pub const DEFAULT_ROUND_DELAY: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("No valid role mentions found. Mention at least one role that may join.")]
    NoAllowedRoles,
    #[error("The enrollment window must last at least one second.")]
    ZeroDuration,
    #[error("The enrollment window can last at most {} seconds.", MAX_WINDOW.as_secs())]
    WindowTooLong,
    #[error("A rumble is already running in this channel.")]
    AlreadyRunning,
}

/// Validated options for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub window: Duration,
    pub allowed_roles: AllowedRoles,
    pub track: String,
    pub reward_role: Option<String>,
    pub reward_points: Option<u64>,
}

impl SessionConfig {
    /// Validates a start request. Bad reward settings are dropped with a
    /// warning rather than refusing the session.
    pub fn from_request(request: &StartRequest) -> Result<Self, SessionError> {
        let allowed_roles =
            AllowedRoles::parse(&request.roles).ok_or(SessionError::NoAllowedRoles)?;
        if request.duration_secs == 0 {
            return Err(SessionError::ZeroDuration);
        }
        if request.duration_secs > MAX_WINDOW.as_secs() {
            return Err(SessionError::WindowTooLong);
        }
        let track = request
            .track
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TRACK)
            .to_string();
        let reward_role = request.reward_role.as_deref().and_then(|raw| {
            let role = parse_role_id(raw);
            if role.is_none() {
                tracing::warn!("[Rumble] Ignoring unparseable reward role {raw:?}");
            }
            role
        });
        Ok(Self {
            window: Duration::from_secs(request.duration_secs),
            allowed_roles,
            track,
            reward_role,
            reward_points: parse_reward_points(request.reward_points.as_deref()),
        })
    }
}

/// Positive whole numbers only; anything else is no reward.
pub fn parse_reward_points(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(points) => Some(points),
        Err(err) => {
            tracing::warn!("[Rumble] Ignoring reward points {raw:?}: {err}");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub round_delay: Duration,
    pub reminder_every: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            round_delay: DEFAULT_ROUND_DELAY,
            reminder_every: crate::collector::DEFAULT_REMINDER_INTERVAL,
        }
    }
}

impl Pacing {
    /// No waiting between rounds and no reminders.
    pub fn instant() -> Self {
        Self {
            round_delay: Duration::ZERO,
            reminder_every: Duration::ZERO,
        }
    }
}

/// The services a session reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub sink: Arc<dyn AnnouncementSink>,
    pub granter: Arc<dyn RoleGranter>,
    pub ledger: Arc<dyn PointStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Cancelled,
    Won {
        winner: Participant,
        rounds: u32,
        /// Winner's balance after the reward, if points were awarded.
        balance: Option<u64>,
    },
}

/// A match in progress along with what the winner will receive.
#[derive(Debug, Clone)]
pub struct RumbleSession {
    engine: RumbleEngine,
    track: String,
    reward_role: Option<String>,
    reward_points: Option<u64>,
}

impl RumbleSession {
    /// `None` for an empty roster.
    pub fn start(roster: &Roster, config: &SessionConfig) -> Option<Self> {
        Some(Self {
            engine: RumbleEngine::new(roster)?,
            track: config.track.clone(),
            reward_role: config.reward_role.clone(),
            reward_points: config.reward_points,
        })
    }

    /// Plays rounds until one player is left, then rewards them.
    pub async fn run<D: Dice + Send + ?Sized>(
        mut self,
        dice: &mut D,
        round_delay: Duration,
        collaborators: &Collaborators,
    ) -> SessionOutcome {
        let sink = &collaborators.sink;
        sink.announce_round_start(self.engine.roster(), &self.track);

        let winner = loop {
            if let Some(winner) = self.engine.winner() {
                break winner.clone();
            }
            if !round_delay.is_zero() {
                tokio::time::sleep(round_delay).await;
            }
            let outcome = self.engine.play_round(dice);
            tracing::info!(
                "[Rumble] Round {}: {} drawn, {} out, {} saved, {} left",
                outcome.round,
                outcome.drawn,
                outcome.eliminated.len(),
                outcome.saved.len(),
                outcome.remaining
            );
            sink.announce_elimination(outcome.round, &outcome.eliminated, outcome.remaining);
        };

        let rounds = self.engine.round();
        sink.announce_winner(&winner);
        tracing::info!("[Rumble] {} ({}) won after {rounds} rounds", winner.label, winner.id);

        let balance = self.reward(&winner, collaborators).await;
        SessionOutcome::Won {
            winner,
            rounds,
            balance,
        }
    }

    async fn reward(&self, winner: &Participant, collaborators: &Collaborators) -> Option<u64> {
        if let Some(role) = &self.reward_role {
            collaborators.granter.grant_role(&winner.id, role);
        }
        let points = self.reward_points?;
        // File ledgers write synchronously under their lock.
        let ledger = collaborators.ledger.clone();
        let id = winner.id.clone();
        match tokio::task::spawn_blocking(move || ledger.credit(&id, points)).await {
            Ok(Ok(balance)) => Some(balance),
            Ok(Err(err)) => {
                tracing::error!("[Ledger] Failed to persist {points} points for {}: {err}", winner.id);
                Some(collaborators.ledger.get(&winner.id))
            }
            Err(err) => {
                tracing::error!("[Ledger] Credit task for {} failed: {err}", winner.id);
                Some(collaborators.ledger.get(&winner.id))
            }
        }
    }
}

/// Runs enrollment then the match. Nobody enrolling cancels the session.
pub async fn run_session<S, D>(
    config: &SessionConfig,
    pacing: Pacing,
    join_emoji: &str,
    source: &mut S,
    dice: &mut D,
    collaborators: &Collaborators,
) -> SessionOutcome
where
    S: SignalSource + ?Sized,
    D: Dice + Send + ?Sized,
{
    let roster = Collector::new(config.window, config.allowed_roles.clone())
        .reminder_every(pacing.reminder_every)
        .join_emoji(join_emoji)
        .collect(source, collaborators.sink.clone())
        .await;

    match RumbleSession::start(&roster, config) {
        Some(session) => session.run(dice, pacing.round_delay, collaborators).await,
        None => {
            tracing::info!("[Rumble] Nobody joined, cancelling");
            collaborators.sink.announce_cancelled();
            SessionOutcome::Cancelled
        }
    }
}
