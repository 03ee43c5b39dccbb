use std::{
    collections::VecDeque,
    io::Write,
    path::Path,
    sync::{Mutex as StdMutex, PoisonError},
    time::Duration,
};

use log::error;
use navilynx_logic::{
    Coordinate, NavigationEvent, NavigationSettings, NavigationUpdateSender, PositionSource,
};
use serde::Deserialize;
use tokio::sync::Mutex;

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

/// Parse `LAT,LNG`
pub fn parse_coordinate(raw: &str) -> Result<Coordinate> {
    let (lat, long) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected LAT,LNG, got \"{raw}\""))?;
    let lat = lat.trim().parse::<f64>().context("Invalid latitude")?;
    let long = long.trim().parse::<f64>().context("Invalid longitude")?;
    Coordinate::new(lat, long)
        .validate()
        .context("Coordinate out of range")
}

/// A made up walk between two points
#[derive(Debug, Clone)]
pub struct WalkPlan {
    pub from: Coordinate,
    pub to: Coordinate,
    /// Number of legs between samples, the track has one more point than this
    pub samples: usize,
    /// Constant sideways bias, like a GPS that's consistently a bit off
    pub lateral_offset_m: f64,
    /// How far the walk bulges sideways at its midpoint, positive is to the right
    pub detour_m: f64,
}

impl WalkPlan {
    pub fn track(&self) -> Vec<Coordinate> {
        let samples = self.samples.max(1);
        let right = (self.from.bearing_to(&self.to) + 90.0).to_radians();

        (0..=samples)
            .map(|i| {
                let t = i as f64 / samples as f64;
                let sideways =
                    self.lateral_offset_m + self.detour_m * (std::f64::consts::PI * t).sin();
                self.from
                    .lerp(&self.to, t)
                    .offset_meters(sideways * right.cos(), sideways * right.sin())
            })
            .collect()
    }
}

/// Parse a track, a JSON array of `{"lat": .., "long": ..}` objects or `[lat, long]` pairs
pub fn parse_track(raw: &str) -> Result<Vec<Coordinate>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TrackPoint {
        Object(Coordinate),
        Pair(f64, f64),
    }

    let points: Vec<TrackPoint> = serde_json::from_str(raw).context("Failed to parse track")?;
    Ok(points
        .into_iter()
        .map(|p| match p {
            TrackPoint::Object(coord) => coord,
            TrackPoint::Pair(lat, long) => Coordinate::new(lat, long),
        })
        .collect())
}

pub fn load_track(path: &Path) -> Result<Vec<Coordinate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track {}", path.display()))?;
    parse_track(&raw)
}

pub fn load_settings(path: Option<&Path>) -> Result<NavigationSettings> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings {}", path.display()))?;
            serde_json::from_str(&raw).context("Failed to parse settings")
        }
        None => Ok(NavigationSettings::default()),
    }
}

/// Plays back a fixed list of positions, one every `interval`
pub struct TrackPositions {
    track: Mutex<VecDeque<Coordinate>>,
    interval: Duration,
}

impl TrackPositions {
    pub fn new(track: Vec<Coordinate>, interval: Duration) -> Self {
        Self {
            track: Mutex::new(track.into()),
            interval,
        }
    }
}

impl PositionSource for TrackPositions {
    async fn next_position(&self) -> Option<Coordinate> {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        self.track.lock().await.pop_front()
    }
}

/// Writes every event as one line of JSON
pub struct JsonLineSender<W: Write + Send> {
    out: StdMutex<W>,
}

impl<W: Write + Send> JsonLineSender<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: StdMutex::new(out),
        }
    }
}

impl JsonLineSender<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> NavigationUpdateSender for JsonLineSender<W> {
    fn send_event(&self, event: NavigationEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(why) => {
                error!("Couldn't serialize event: {why}");
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(why) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            error!("Couldn't write event: {why}");
        }
    }
}
