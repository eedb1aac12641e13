//! Routes gateway events to per-channel rumble sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::sync::mpsc;

use crate::announce::{Announcement, AnnouncementSink, RoleGranter};
use crate::collector::{Actor, Signal, SignalKind};
use crate::commands::{render_balance, render_leaderboard, Command, StartRequest};
use crate::gate::{AccessGate, Verdict};
use crate::gateway::{InboundEvent, OutboundFrame};
use crate::ledger::PointStore;
use crate::session::{run_session, Collaborators, Pacing, SessionConfig, SessionError};
use crate::settings::Settings;

const SIGNAL_BUFFER: usize = 256;

type SessionMap = Arc<Mutex<HashMap<String, mpsc::Sender<Signal>>>>;

/// Frees a channel's session slot when dropped, including when the session
/// task panics.
struct SessionSlot {
    sessions: SessionMap,
    channel_id: String,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.channel_id);
    }
}

/// Announcements and role grants for one channel, queued to the gateway.
pub struct ChannelSink {
    channel_id: String,
    outbox: mpsc::UnboundedSender<OutboundFrame>,
}

impl AnnouncementSink for ChannelSink {
    fn announce(&self, announcement: Announcement) {
        let _ = self.outbox.send(OutboundFrame::Announce {
            channel_id: self.channel_id.clone(),
            announcement,
        });
    }
}

impl RoleGranter for ChannelSink {
    fn grant_role(&self, user_id: &str, role_id: &str) {
        let _ = self.outbox.send(OutboundFrame::GrantRole {
            channel_id: self.channel_id.clone(),
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        });
    }
}

pub struct Bot {
    gate: AccessGate,
    pacing: Pacing,
    join_emoji: String,
    ledger: Arc<dyn PointStore>,
    outbox: mpsc::UnboundedSender<OutboundFrame>,
    sessions: SessionMap,
}

impl Bot {
    pub fn new(
        settings: &Settings,
        ledger: Arc<dyn PointStore>,
        outbox: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        Self {
            gate: settings.gate(),
            pacing: settings.pacing(),
            join_emoji: settings.join_emoji.clone(),
            ledger,
            outbox,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn running_sessions(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Must be called from within a tokio runtime.
    pub fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::Command {
                channel_id,
                interaction_id,
                user,
                command,
            } => match command {
                Command::Start(request) => self.start(channel_id, interaction_id, &request),
                Command::Leaderboard => {
                    let text = render_leaderboard(&self.ledger.rank());
                    self.reply(channel_id, interaction_id, text, false);
                }
                Command::Balance => {
                    let text = render_balance(self.ledger.get(&user.id));
                    self.reply(channel_id, interaction_id, text, true);
                }
            },
            InboundEvent::Interaction {
                id,
                channel_id,
                custom_id,
                user,
                at_ms,
            } => match self.gate.screen(custom_id.as_deref(), &user.id, &user.roles) {
                Verdict::Ignore => {}
                Verdict::Reject(message) => {
                    tracing::info!("[Gate] Rejected {} in {channel_id}", user.id);
                    self.reply(channel_id, Some(id), message.to_string(), true);
                }
                Verdict::Admit => {
                    let _ = self.outbox.send(OutboundFrame::Defer { interaction_id: id });
                    let custom_id = custom_id.unwrap_or_default();
                    self.forward(&channel_id, user, SignalKind::Button { custom_id }, at_ms);
                }
            },
            InboundEvent::Reaction {
                channel_id,
                emoji,
                user,
                at_ms,
            } => self.forward(&channel_id, user, SignalKind::Reaction { emoji }, at_ms),
        }
    }

    fn start(&self, channel_id: String, interaction_id: Option<String>, request: &StartRequest) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(&channel_id) {
            drop(sessions);
            let text = SessionError::AlreadyRunning.to_string();
            self.reply(channel_id, interaction_id, text, true);
            return;
        }
        let config = match SessionConfig::from_request(request) {
            Ok(config) => config,
            Err(err) => {
                drop(sessions);
                self.reply(channel_id, interaction_id, err.to_string(), true);
                return;
            }
        };

        let (signal_tx, mut signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        sessions.insert(channel_id.clone(), signal_tx);
        drop(sessions);

        tracing::info!(
            "[Rumble] Starting in {channel_id}: {}s window, track {:?}",
            config.window.as_secs(),
            config.track
        );
        let text = format!(
            "⚔️ A rumble on **{}** is starting! React with {} or press Join within {} seconds.",
            config.track,
            self.join_emoji,
            config.window.as_secs()
        );
        self.reply(channel_id.clone(), interaction_id, text, false);

        let channel_sink = Arc::new(ChannelSink {
            channel_id: channel_id.clone(),
            outbox: self.outbox.clone(),
        });
        let collaborators = Collaborators {
            sink: channel_sink.clone(),
            granter: channel_sink,
            ledger: self.ledger.clone(),
        };
        let pacing = self.pacing;
        let join_emoji = self.join_emoji.clone();
        let slot = SessionSlot {
            sessions: self.sessions.clone(),
            channel_id: channel_id.clone(),
        };
        tokio::spawn(async move {
            let _slot = slot;
            let mut dice = ChaCha20Rng::from_entropy();
            let outcome = run_session(
                &config,
                pacing,
                &join_emoji,
                &mut signal_rx,
                &mut dice,
                &collaborators,
            )
            .await;
            tracing::info!("[Rumble] Session in {channel_id} finished: {outcome:?}");
        });
    }

    fn forward(&self, channel_id: &str, actor: Actor, kind: SignalKind, at_ms: u64) {
        let sender = self
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel_id)
            .cloned();
        let Some(sender) = sender else {
            tracing::debug!("[Rumble] No session in {channel_id}, dropping signal");
            return;
        };
        let signal = Signal { actor, kind, at_ms };
        match sender.try_send(signal) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(signal)) => {
                tracing::warn!("[Rumble] Signal buffer full in {channel_id}, dropping {}", signal.actor.id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("[Rumble] Enrollment in {channel_id} is over, dropping signal");
            }
        }
    }

    fn reply(
        &self,
        channel_id: String,
        interaction_id: Option<String>,
        content: String,
        ephemeral: bool,
    ) {
        let _ = self.outbox.send(OutboundFrame::Reply {
            channel_id,
            interaction_id,
            content,
            ephemeral,
        });
    }
}
