use std::{error, fmt};

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Why a routing provider could not produce a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingError {
    /// The provider answered, but there is no way between the two points.
    /// Retrying won't help, the user should be asked what to do.
    NoRoute,
    /// The provider did not answer in time
    Timeout,
    /// Any other provider or network failure
    Provider(String),
}

impl RoutingError {
    /// Whether retrying the same request later might succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NoRoute)
    }
}

impl error::Error for RoutingError {}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NoRoute => write!(f, "No route found"),
            Self::Timeout => write!(f, "Routing request timed out"),
            Self::Provider(why) => write!(f, "Routing provider error: {why}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// A coordinate was NaN, infinite or out of range, nothing was changed
    InvalidCoordinate(Coordinate),
    /// A route must contain at least one step
    EmptyRoute,
    Routing(RoutingError),
}

impl error::Error for NavigationError {}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidCoordinate(coord) => {
                write!(f, "Invalid coordinate ({}, {})", coord.lat, coord.long)
            }
            Self::EmptyRoute => write!(f, "Route has no steps"),
            Self::Routing(why) => write!(f, "{why}"),
        }
    }
}

impl From<RoutingError> for NavigationError {
    fn from(e: RoutingError) -> Self {
        Self::Routing(e)
    }
}
