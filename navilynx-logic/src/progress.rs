use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    error::NavigationError,
    geo::Coordinate,
    route::{Maneuver, Route, RouteStep},
    settings::{NavigationSettings, ProgressMode},
};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// Instruction shown once the last step is reached
pub const ARRIVAL_INSTRUCTION: &str = "You have arrived at your destination";

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Snapshot of how far along the current route the traveler is
pub struct NavigationProgress {
    /// Index of the step currently being walked, always in bounds of the route
    pub step_index: usize,
    pub distance_to_next_maneuver_m: f64,
    pub distance_to_destination_m: f64,
    /// Estimate of journey completion in `[0, 1]`, never goes down during a session
    pub fraction: f64,
    pub off_route: bool,
    pub arrived: bool,
    /// Instruction for the upcoming maneuver, or the arrival message
    pub instruction: String,
    pub maneuver: Maneuver,
    pub updated_at: UtcDT,
}

/// Turns a stream of positions into [NavigationProgress] for one [Route] at a time.
///
/// Both rules here are proximity checks against the current step's coordinate, not
/// projections onto the route line:
/// - A step is complete once the traveler comes within `arrival_threshold_m` of its
///   coordinate, so cutting a corner wide can miss the advance.
/// - The traveler is off route once they are further from the step's coordinate than
///   the step's own leg is long, plus `off_route_threshold_m`. Lateral drift on long legs
///   goes unnoticed and shortcuts near sharp turns can be flagged.
pub struct ProgressTracker {
    route: Route,
    settings: NavigationSettings,
    step_index: usize,
    arrived: bool,
    /// Best completion seen on the current route alone
    route_fraction: f64,
    /// Session completion at the moment the current route was installed
    floor: f64,
    last_position: Option<Coordinate>,
    progress: NavigationProgress,
}

impl ProgressTracker {
    pub fn new(route: Route, settings: NavigationSettings) -> Self {
        let progress = Self::initial_progress(&route, 0.0);
        Self {
            route,
            settings,
            step_index: 0,
            arrived: false,
            route_fraction: 0.0,
            floor: 0.0,
            last_position: None,
            progress,
        }
    }

    fn initial_progress(route: &Route, fraction: f64) -> NavigationProgress {
        let first = route.step(0);
        NavigationProgress {
            step_index: 0,
            distance_to_next_maneuver_m: route.leg_length_m(0),
            distance_to_destination_m: route.total_distance_m(),
            fraction,
            off_route: false,
            arrived: false,
            instruction: first.instruction.clone(),
            maneuver: first.maneuver,
            updated_at: Utc::now(),
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn progress(&self) -> &NavigationProgress {
        &self.progress
    }

    pub fn current_step(&self) -> &RouteStep {
        self.route.step(self.step_index)
    }

    pub fn is_arrived(&self) -> bool {
        self.arrived
    }

    pub fn last_position(&self) -> Option<Coordinate> {
        self.last_position
    }

    /// Feed a new position sample. Invalid coordinates are rejected without touching
    /// any state.
    pub fn update(&mut self, position: Coordinate) -> Result<NavigationProgress, NavigationError> {
        let position = position.validate()?;
        self.last_position = Some(position);

        if !self.arrived {
            let target = self.current_step().coordinate;
            if position.distance_to(&target) < self.settings.arrival_threshold_m {
                if self.step_index < self.route.last_index() {
                    self.step_index += 1;
                    debug!(
                        "Advanced to step {} of {}",
                        self.step_index,
                        self.route.len()
                    );
                } else {
                    self.arrived = true;
                    info!("Arrived at destination");
                }
            }
        }

        Ok(self.recompute(position))
    }

    /// Replace the route after a recalculation. The step index starts over, completion
    /// carries on from where it was.
    pub fn install_route(&mut self, route: Route) -> NavigationProgress {
        self.floor = self.progress.fraction;
        self.route_fraction = 0.0;
        self.step_index = 0;
        self.arrived = false;
        self.route = route;

        if let Some(position) = self.last_position {
            self.recompute(position)
        } else {
            self.progress = Self::initial_progress(&self.route, self.floor);
            self.progress.clone()
        }
    }

    fn current_route_fraction(&self, distance_to_destination: f64) -> f64 {
        if self.arrived {
            return 1.0;
        }

        let raw = match self.settings.progress_mode {
            ProgressMode::StepIndex => {
                let last = self.route.last_index();
                if last == 0 {
                    0.0
                } else {
                    self.step_index as f64 / last as f64
                }
            }
            ProgressMode::DistanceWeighted => {
                let total = self.route.total_distance_m();
                if total > 0.0 {
                    1.0 - distance_to_destination / total
                } else {
                    0.0
                }
            }
        };

        raw.clamp(0.0, 1.0)
    }

    fn recompute(&mut self, position: Coordinate) -> NavigationProgress {
        let step = self.route.step(self.step_index);
        let to_next = position.distance_to(&step.coordinate);
        let remaining_after = (self.route.total_distance_m() - step.distance_from_start_m).max(0.0);
        let to_destination = to_next + remaining_after;

        let excess = to_next - self.route.leg_length_m(self.step_index);
        let off_route = !self.arrived && excess > self.settings.off_route_threshold_m;

        if off_route != self.progress.off_route {
            if off_route {
                warn!(
                    "Off route, {to_next:.0}m from step {} ({excess:.0}m past its leg)",
                    self.step_index
                );
            } else {
                info!("Back on route");
            }
        }

        self.route_fraction = self
            .route_fraction
            .max(self.current_route_fraction(to_destination));
        let fraction = (self.floor + (1.0 - self.floor) * self.route_fraction).clamp(0.0, 1.0);

        let (instruction, maneuver) = if self.arrived {
            (ARRIVAL_INSTRUCTION.to_string(), Maneuver::Arrive)
        } else {
            (step.instruction.clone(), step.maneuver)
        };

        self.progress = NavigationProgress {
            step_index: self.step_index,
            distance_to_next_maneuver_m: to_next,
            distance_to_destination_m: to_destination,
            fraction,
            off_route,
            arrived: self.arrived,
            instruction,
            maneuver,
            updated_at: Utc::now(),
        };

        self.progress.clone()
    }
}
