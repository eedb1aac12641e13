//! Outbound reporting for a rumble session.
//!
//! Announcements are fire-and-forget: implementations queue them for the
//! chat platform and never make the session wait for delivery.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::roster::Participant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    pub participant: Participant,
    pub reason: String,
}

/// Everything a session reports while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Announcement {
    Reminder {
        remaining_secs: u64,
    },
    Cancelled,
    RoundStart {
        roster: Vec<Participant>,
        track: String,
    },
    Eliminations {
        round: u32,
        eliminated: Vec<Elimination>,
        remaining: usize,
    },
    Winner {
        participant: Participant,
    },
}

pub trait AnnouncementSink: Send + Sync {
    fn announce(&self, announcement: Announcement);

    fn announce_round_start(&self, roster: &[Participant], track: &str) {
        self.announce(Announcement::RoundStart {
            roster: roster.to_vec(),
            track: track.to_string(),
        });
    }

    fn announce_elimination(&self, round: u32, eliminated: &[Elimination], remaining: usize) {
        self.announce(Announcement::Eliminations {
            round,
            eliminated: eliminated.to_vec(),
            remaining,
        });
    }

    fn announce_winner(&self, participant: &Participant) {
        self.announce(Announcement::Winner {
            participant: participant.clone(),
        });
    }

    fn announce_cancelled(&self) {
        self.announce(Announcement::Cancelled);
    }

    fn announce_reminder(&self, remaining_secs: u64) {
        self.announce(Announcement::Reminder { remaining_secs });
    }
}

/// Grants the winner's reward role on the chat platform.
pub trait RoleGranter: Send + Sync {
    fn grant_role(&self, user_id: &str, role_id: &str);
}

/// Sink that keeps everything it is told, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    announcements: Mutex<Vec<Announcement>>,
    grants: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.announcements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn grants(&self) -> Vec<(String, String)> {
        self.grants.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AnnouncementSink for RecordingSink {
    fn announce(&self, announcement: Announcement) {
        self.announcements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(announcement);
    }
}

impl RoleGranter for RecordingSink {
    fn grant_role(&self, user_id: &str, role_id: &str) {
        self.grants
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((user_id.to_string(), role_id.to_string()));
    }
}
