//! Rumble elimination rounds.
//!
//! Each round draws a batch of two to five candidates (never the whole
//! active set). Every candidate has a one-in-five chance of surviving the
//! draw; the rest are out for good. Rounds repeat until one player is left.

use rand::Rng;

use crate::announce::Elimination;
use crate::roster::{Participant, Roster};

pub const MIN_BATCH: usize = 2;
pub const MAX_BATCH: usize = 5;
pub const SAVE_CHANCE: f64 = 0.20;

pub const REASONS: [&str; 12] = [
    "tripped over their own shoelaces",
    "was launched out of the arena by a rogue catapult",
    "trusted the wrong ally",
    "stopped to read the terms and conditions",
    "got lost looking for the snack bar",
    "challenged the referee and lost",
    "was flattened by a runaway shopping cart",
    "fell asleep during the countdown",
    "picked a fight with a very large goose",
    "stepped on a suspiciously shiny tile",
    "forgot which team they were on",
    "was ejected for excessive trash talk",
];

/// Source of every random decision the engine makes.
pub trait Dice {
    /// Uniform in `min..=max`.
    fn batch_size(&mut self, min: usize, max: usize) -> usize;
    /// Uniform in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
    /// True with probability `chance`.
    fn saved(&mut self, chance: f64) -> bool;
}

impl<R: Rng + ?Sized> Dice for R {
    fn batch_size(&mut self, min: usize, max: usize) -> usize {
        self.gen_range(min..=max)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }

    fn saved(&mut self, chance: f64) -> bool {
        self.gen_bool(chance)
    }
}

/// What happened in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u32,
    /// Candidates drawn this round, saved or not.
    pub drawn: usize,
    pub eliminated: Vec<Elimination>,
    pub saved: Vec<Participant>,
    pub remaining: usize,
}

/// A single match from the first round to the winner.
#[derive(Debug, Clone)]
pub struct RumbleEngine {
    roster: Vec<Participant>,
    active: Vec<Participant>,
    round: u32,
}

impl RumbleEngine {
    /// Starts a match, or `None` when nobody enrolled.
    pub fn new(roster: &Roster) -> Option<Self> {
        if roster.is_empty() {
            return None;
        }
        let roster = roster.participants().to_vec();
        Some(Self {
            active: roster.clone(),
            roster,
            round: 0,
        })
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn active(&self) -> &[Participant] {
        &self.active
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_complete(&self) -> bool {
        self.active.len() == 1
    }

    pub fn winner(&self) -> Option<&Participant> {
        match self.active.as_slice() {
            [winner] => Some(winner),
            _ => None,
        }
    }

    /// Plays one round. Once complete, further calls draw nobody.
    pub fn play_round<D: Dice + ?Sized>(&mut self, dice: &mut D) -> RoundOutcome {
        if self.is_complete() {
            return RoundOutcome {
                round: self.round,
                drawn: 0,
                eliminated: Vec::new(),
                saved: Vec::new(),
                remaining: self.active.len(),
            };
        }

        self.round += 1;
        let drawn = batch_size(dice, self.active.len());

        let mut undrawn: Vec<usize> = (0..self.active.len()).collect();
        let mut out = Vec::with_capacity(drawn);
        let mut eliminated = Vec::with_capacity(drawn);
        let mut saved = Vec::new();
        for _ in 0..drawn {
            let candidate = undrawn.swap_remove(dice.pick(undrawn.len()));
            let participant = &self.active[candidate];
            if dice.saved(SAVE_CHANCE) {
                saved.push(participant.clone());
                continue;
            }
            let reason = REASONS[dice.pick(REASONS.len())];
            eliminated.push(Elimination {
                participant: participant.clone(),
                reason: reason.to_string(),
            });
            out.push(candidate);
        }

        let mut index = 0;
        self.active.retain(|_| {
            let keep = !out.contains(&index);
            index += 1;
            keep
        });

        RoundOutcome {
            round: self.round,
            drawn,
            eliminated,
            saved,
            remaining: self.active.len(),
        }
    }
}

/// How many candidates to draw from `active` players; always leaves one.
pub fn batch_size<D: Dice + ?Sized>(dice: &mut D, active: usize) -> usize {
    if active <= 1 {
        return 0;
    }
    dice.batch_size(MIN_BATCH, MAX_BATCH).min(active - 1)
}
