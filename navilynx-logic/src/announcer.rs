use std::collections::HashSet;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::{
    phrasing::{PhraseContext, Tone, phrase},
    progress::{NavigationProgress, UtcDT},
    route::Maneuver,
    settings::NavigationSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    /// First instruction of a session
    Depart,
    /// The next maneuver is within the early warning distance
    Approaching,
    /// The next maneuver is within the immediate distance
    Immediate,
    Arrived,
    OffRoute,
    /// A new route was installed
    Recalculated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncerState {
    Idle,
    ApproachingTurn,
    AtTurn,
    /// Terminal for the session
    Arrived,
    OffRoute,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Text to show or speak, handed to the presentation layer
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub step_index: usize,
    pub maneuver: Maneuver,
    pub text: String,
    pub issued_at: UtcDT,
}

type AnnouncementKey = (u64, usize, AnnouncementKind);

/// Decides when the traveler needs to be told something, and makes sure they are
/// never told the same thing twice.
pub struct Announcer {
    state: AnnouncerState,
    early_warning_m: f64,
    immediate_m: f64,
    tone: Tone,
    rng: ChaCha20Rng,
    /// Bumped every time a new route is installed
    route_generation: u64,
    step_index: usize,
    emitted: HashSet<AnnouncementKey>,
}

impl Announcer {
    pub fn new(settings: &NavigationSettings) -> Self {
        Self {
            state: AnnouncerState::Idle,
            early_warning_m: settings.early_warning_m,
            immediate_m: settings.immediate_m,
            tone: settings.tone,
            rng: ChaCha20Rng::seed_from_u64(settings.phrase_seed),
            route_generation: 0,
            step_index: 0,
            emitted: HashSet::with_capacity(16),
        }
    }

    pub fn state(&self) -> AnnouncerState {
        self.state
    }

    /// Opening announcement for a session
    pub fn begin(&mut self, progress: &NavigationProgress) -> Option<Announcement> {
        self.step_index = progress.step_index;
        self.settle(progress);
        self.emit(AnnouncementKind::Depart, progress)
    }

    /// A new route is in place, announce it and pick up from whatever state the new
    /// progress calls for.
    pub fn route_recalculated(&mut self, progress: &NavigationProgress) -> Option<Announcement> {
        if self.state == AnnouncerState::Arrived {
            return None;
        }
        self.route_generation += 1;
        self.step_index = progress.step_index;
        self.settle(progress);
        self.emit(AnnouncementKind::Recalculated, progress)
    }

    /// Look at the latest progress and decide if something needs announcing
    pub fn observe(&mut self, progress: &NavigationProgress) -> Option<Announcement> {
        if self.state == AnnouncerState::Arrived {
            return None;
        }

        if progress.arrived {
            self.state = AnnouncerState::Arrived;
            return self.emit(AnnouncementKind::Arrived, progress);
        }

        if progress.off_route {
            if self.state == AnnouncerState::OffRoute {
                return None;
            }
            // Once per episode, the state is the dedup
            self.state = AnnouncerState::OffRoute;
            return Some(self.announce(AnnouncementKind::OffRoute, progress));
        }

        if progress.step_index != self.step_index {
            self.step_index = progress.step_index;
            self.state = AnnouncerState::Idle;
        } else if self.state == AnnouncerState::OffRoute {
            // Back on the same route, already announced thresholds stay silenced
            self.state = AnnouncerState::Idle;
        }

        let distance = progress.distance_to_next_maneuver_m;
        match self.state {
            AnnouncerState::Idle | AnnouncerState::ApproachingTurn
                if distance < self.immediate_m =>
            {
                self.state = AnnouncerState::AtTurn;
                self.emit(AnnouncementKind::Immediate, progress)
            }
            AnnouncerState::Idle if distance < self.early_warning_m => {
                self.state = AnnouncerState::ApproachingTurn;
                self.emit(AnnouncementKind::Approaching, progress)
            }
            _ => None,
        }
    }

    /// Jump straight to the state matching `progress` without announcing anything
    fn settle(&mut self, progress: &NavigationProgress) {
        let distance = progress.distance_to_next_maneuver_m;
        self.state = if distance < self.immediate_m {
            AnnouncerState::AtTurn
        } else if distance < self.early_warning_m {
            AnnouncerState::ApproachingTurn
        } else {
            AnnouncerState::Idle
        };
    }

    fn emit(
        &mut self,
        kind: AnnouncementKind,
        progress: &NavigationProgress,
    ) -> Option<Announcement> {
        let key = (self.route_generation, progress.step_index, kind);
        if !self.emitted.insert(key) {
            return None;
        }

        Some(self.announce(kind, progress))
    }

    fn announce(&mut self, kind: AnnouncementKind, progress: &NavigationProgress) -> Announcement {
        let ctx = PhraseContext {
            maneuver: progress.maneuver,
            instruction: &progress.instruction,
            distance_m: progress.distance_to_next_maneuver_m,
        };

        Announcement {
            kind,
            step_index: progress.step_index,
            maneuver: progress.maneuver,
            text: phrase(kind, &ctx, self.tone, &mut self.rng),
            issued_at: Utc::now(),
        }
    }
}
