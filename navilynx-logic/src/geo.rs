//! Spherical-earth helpers. Everything here treats the earth as a sphere of
//! radius [EARTH_RADIUS_M], which is plenty for walking-scale distances.

use serde::{Deserialize, Serialize};

use crate::error::NavigationError;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A "part" of a coordinate, in degrees
pub type CoordinateComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// Some point in the world in WGS84 degrees, as gotten from a position source
pub struct Coordinate {
    /// Latitude
    pub lat: CoordinateComponent,
    /// Longitude
    pub long: CoordinateComponent,
}

impl Coordinate {
    pub const fn new(lat: CoordinateComponent, long: CoordinateComponent) -> Self {
        Self { lat, long }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.long.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.long)
    }

    pub fn validate(self) -> Result<Self, NavigationError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(NavigationError::InvalidCoordinate(self))
        }
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance(self, other)
    }

    /// Initial bearing towards `other` in degrees, `[0, 360)` clockwise from north
    pub fn bearing_to(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_long = (other.long - self.long).to_radians();

        let y = d_long.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_long.cos();

        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    /// Point `t` of the way towards `other`. Interpolates the raw degrees, so only
    /// use this over short distances.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            long: self.long + (other.long - self.long) * t,
        }
    }

    /// Move this point by a number of meters north and east (negative for south / west)
    pub fn offset_meters(&self, north: f64, east: f64) -> Self {
        let d_lat = (north / EARTH_RADIUS_M).to_degrees();
        let d_long = (east / (EARTH_RADIUS_M * self.lat.to_radians().cos())).to_degrees();
        Self {
            lat: self.lat + d_lat,
            long: self.long + d_long,
        }
    }
}

/// Haversine distance between two coordinates in meters.
///
/// Altitude is ignored. NaN in, NaN out; validate at the boundary with
/// [Coordinate::validate].
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_long = (b.long - a.long).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_long / 2.0).sin().powi(2);
    // Rounding can push h a hair over 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Signed change of heading at `via` when going `from` -> `via` -> `to`, in degrees.
/// Positive is a right turn, negative a left one, range `[-180, 180]`.
pub fn turn_angle(from: &Coordinate, via: &Coordinate, to: &Coordinate) -> f64 {
    let mut angle = via.bearing_to(to) - from.bearing_to(via);

    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }

    angle
}
