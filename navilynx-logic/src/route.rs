use serde::{Deserialize, Serialize};

use crate::{error::NavigationError, geo::Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// What the traveler has to do at the end of a step
pub enum Maneuver {
    Depart,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    Arrive,
}

impl Maneuver {
    /// Classify a signed change of heading (see [crate::geo::turn_angle])
    pub fn from_turn_angle(angle: f64) -> Self {
        let abs_angle = angle.abs();
        let right = angle > 0.0;

        if abs_angle > 170.0 {
            Self::UTurn
        } else if abs_angle > 120.0 {
            if right { Self::SharpRight } else { Self::SharpLeft }
        } else if abs_angle > 60.0 {
            if right { Self::Right } else { Self::Left }
        } else if abs_angle > 20.0 {
            if right { Self::SlightRight } else { Self::SlightLeft }
        } else {
            Self::Straight
        }
    }

    pub fn is_turn(&self) -> bool {
        !matches!(self, Self::Depart | Self::Straight | Self::Arrive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One instructable segment of a [Route]
pub struct RouteStep {
    /// Where this step ends, the maneuver happens here
    pub coordinate: Coordinate,
    /// Human-readable text for the maneuver at [RouteStep::coordinate]
    pub instruction: String,
    pub maneuver: Maneuver,
    /// Distance along the route from its origin to the end of this step, in meters
    pub distance_from_start_m: f64,
    /// Estimated time to walk / drive this step, in seconds
    pub duration_s: f64,
}

impl RouteStep {
    pub fn new(
        coordinate: Coordinate,
        instruction: impl Into<String>,
        maneuver: Maneuver,
        distance_from_start_m: f64,
        duration_s: f64,
    ) -> Self {
        Self {
            coordinate,
            instruction: instruction.into(),
            maneuver,
            distance_from_start_m,
            duration_s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// An ordered path from origin to destination. Never mutated once built, a
/// recalculation produces a whole new [Route].
pub struct Route {
    origin: Coordinate,
    destination: Coordinate,
    steps: Vec<RouteStep>,
    total_distance_m: f64,
    total_duration_s: f64,
}

impl Route {
    pub fn new(
        origin: Coordinate,
        destination: Coordinate,
        steps: Vec<RouteStep>,
    ) -> Result<Self, NavigationError> {
        origin.validate()?;
        destination.validate()?;

        let last = steps.last().ok_or(NavigationError::EmptyRoute)?;

        for step in steps.iter() {
            step.coordinate.validate()?;
        }

        let total_distance_m = last.distance_from_start_m;
        let total_duration_s = steps.iter().map(|s| s.duration_s).sum();

        Ok(Self {
            origin,
            destination,
            steps,
            total_distance_m,
            total_duration_s,
        })
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    pub fn destination(&self) -> Coordinate {
        self.destination
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    /// Get a step, the index is assumed to be in bounds
    pub fn step(&self, index: usize) -> &RouteStep {
        &self.steps[index]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false, routes are never empty. Here for clippy
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn total_duration_s(&self) -> f64 {
        self.total_duration_s
    }

    /// Where the leg leading up to step `index` starts
    pub fn leg_start(&self, index: usize) -> Coordinate {
        if index == 0 {
            self.origin
        } else {
            self.steps[index - 1].coordinate
        }
    }

    /// Straight-line length of the leg leading up to step `index`
    pub fn leg_length_m(&self, index: usize) -> f64 {
        self.leg_start(index)
            .distance_to(&self.steps[index].coordinate)
    }
}
