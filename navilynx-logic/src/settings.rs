use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::phrasing::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
/// How the progress fraction shown to the user is worked out
pub enum ProgressMode {
    /// `step index / (steps - 1)`, steps of very different lengths skew the percentage
    #[default]
    StepIndex,
    /// `1 - distance to destination / total distance`
    DistanceWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Settings for a navigation session. None of the thresholds are backed by
/// positioning-accuracy data, tune them per device.
pub struct NavigationSettings {
    /// Getting closer than this to a step's coordinate completes the step
    pub arrival_threshold_m: f64,
    /// How far past a step's own leg length the traveler may be from its coordinate
    /// before being considered off route
    pub off_route_threshold_m: f64,
    /// Distance to the next maneuver at which it is first announced
    pub early_warning_m: f64,
    /// Distance to the next maneuver at which it is announced again as imminent
    pub immediate_m: f64,
    pub progress_mode: ProgressMode,
    /// Give up on a recalculation request after this many seconds
    pub recalculation_timeout_secs: u32,
    /// Minimum time between two recalculation requests while still off route
    pub recalculation_interval_secs: u32,
    /// Phrasing used for announcements
    pub tone: Tone,
    /// Seed for picking between phrase variants
    pub phrase_seed: u64,
}

impl NavigationSettings {
    pub fn recalculation_timeout(&self) -> Duration {
        Duration::from_secs(self.recalculation_timeout_secs as u64)
    }

    pub fn recalculation_interval(&self) -> Duration {
        Duration::from_secs(self.recalculation_interval_secs as u64)
    }
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            arrival_threshold_m: 20.0,
            off_route_threshold_m: 50.0,
            early_warning_m: 500.0,
            immediate_m: 50.0,
            progress_mode: ProgressMode::StepIndex,
            recalculation_timeout_secs: 10,
            recalculation_interval_secs: 5,
            tone: Tone::Neutral,
            phrase_seed: rand::random_range(0..=u64::MAX),
        }
    }
}
