//! Enrollment window: gathers distinct players who signal to join before
//! the deadline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::announce::AnnouncementSink;
use crate::roster::{Participant, Roster};

pub const DEFAULT_JOIN_EMOJI: &str = "⚔️";
pub const DEFAULT_REMINDER_INTERVAL: Duration = Duration::from_secs(30);
/// Longer windows are cut to this.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub roles: HashSet<String>,
}

impl Actor {
    fn participant(&self) -> Participant {
        let label = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };
        Participant::new(self.id.clone(), label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalKind {
    Reaction { emoji: String },
    Button { custom_id: String },
}

/// Someone reacted to or clicked on the enrollment message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub actor: Actor,
    #[serde(flatten)]
    pub kind: SignalKind,
    #[serde(default)]
    pub at_ms: u64,
}

/// Role IDs whose members may enroll in one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(HashSet<String>);

impl AllowedRoles {
    /// Pulls role IDs out of free text such as `"<@&123> <@&456>"`. Bare
    /// numeric IDs are accepted too. `None` if nothing parses.
    pub fn parse(input: &str) -> Option<Self> {
        let roles: HashSet<String> = input
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter_map(parse_role_id)
            .collect();
        if roles.is_empty() {
            None
        } else {
            Some(Self(roles))
        }
    }

    pub fn contains(&self, role_id: &str) -> bool {
        self.0.contains(role_id)
    }

    pub fn held_by(&self, actor: &Actor) -> bool {
        !self.0.is_disjoint(&actor.roles)
    }

}

/// Role ID from a single `<@&ID>` mention or bare `ID` token.
pub fn parse_role_id(token: &str) -> Option<String> {
    let token = token.trim();
    let id = token
        .strip_prefix("<@&")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Bot,
    NotAJoin,
    MissingRole,
}

/// Where join signals come from.
#[async_trait::async_trait]
pub trait SignalSource: Send {
    /// Next signal, or `None` once the source is exhausted.
    async fn next_signal(&mut self) -> Option<Signal>;

    /// Stops accepting signals. Called once enrollment is over.
    fn close(&mut self) {}
}

#[async_trait::async_trait]
impl SignalSource for mpsc::Receiver<Signal> {
    async fn next_signal(&mut self) -> Option<Signal> {
        self.recv().await
    }

    fn close(&mut self) {
        mpsc::Receiver::close(self);
    }
}

pub struct Collector {
    window: Duration,
    reminder_every: Duration,
    allowed: AllowedRoles,
    join_emoji: String,
}

impl Collector {
    pub fn new(window: Duration, allowed: AllowedRoles) -> Self {
        Self {
            window,
            reminder_every: DEFAULT_REMINDER_INTERVAL,
            allowed,
            join_emoji: DEFAULT_JOIN_EMOJI.to_string(),
        }
    }

    /// Zero disables reminders.
    pub fn reminder_every(mut self, every: Duration) -> Self {
        self.reminder_every = every;
        self
    }

    pub fn join_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.join_emoji = emoji.into();
        self
    }

    pub fn admit(&self, signal: &Signal) -> Result<Participant, Refusal> {
        if signal.actor.bot {
            return Err(Refusal::Bot);
        }
        let joining = match &signal.kind {
            SignalKind::Reaction { emoji } => *emoji == self.join_emoji,
            SignalKind::Button { custom_id } => crate::gate::is_rumble_button(custom_id),
        };
        if !joining {
            return Err(Refusal::NotAJoin);
        }
        if !self.allowed.held_by(&signal.actor) {
            return Err(Refusal::MissingRole);
        }
        Ok(signal.actor.participant())
    }

    /// Runs the window to its deadline and returns everyone who joined,
    /// even if nobody did. An exhausted source does not end the window early.
    /// The source is closed before returning.
    pub async fn collect<S: SignalSource + ?Sized>(
        &self,
        source: &mut S,
        sink: Arc<dyn AnnouncementSink>,
    ) -> Roster {
        let deadline = Instant::now() + self.window.min(MAX_WINDOW);
        let reminders = spawn_reminders(deadline, self.reminder_every, sink);

        let mut roster = Roster::new();
        let mut open = true;
        let closes = tokio::time::sleep_until(deadline);
        tokio::pin!(closes);
        loop {
            tokio::select! {
                _ = &mut closes => break,
                signal = source.next_signal(), if open => {
                    let Some(signal) = signal else {
                        open = false;
                        continue;
                    };
                    match self.admit(&signal) {
                        Ok(participant) => {
                            let id = participant.id.clone();
                            if roster.join(participant) {
                                tracing::debug!("[Rumble] {id} joined ({} enrolled)", roster.len());
                            }
                        }
                        Err(refusal) => {
                            tracing::debug!("[Rumble] Ignored signal from {}: {refusal:?}", signal.actor.id);
                        }
                    }
                }
            }
        }

        if let Some(reminders) = reminders {
            reminders.abort();
        }
        source.close();
        tracing::info!("[Rumble] Enrollment closed with {} players", roster.len());
        roster
    }
}

fn spawn_reminders(
    deadline: Instant,
    every: Duration,
    sink: Arc<dyn AnnouncementSink>,
) -> Option<tokio::task::JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }
    let first = Instant::now().checked_add(every).filter(|first| *first < deadline)?;
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(first, every);
        loop {
            let now = ticker.tick().await;
            if now >= deadline {
                break;
            }
            sink.announce_reminder((deadline - now).as_secs());
        }
    }))
}
