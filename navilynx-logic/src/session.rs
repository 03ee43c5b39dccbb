use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    announcer::{Announcement, Announcer, AnnouncerState},
    error::{NavigationError, RoutingError},
    geo::Coordinate,
    progress::{NavigationProgress, ProgressTracker},
    route::Route,
    routing::{RouteOptions, RouteRequest},
    settings::NavigationSettings,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A route request handed out by the session. Only the result for the most recently
/// issued ticket will be accepted.
pub struct RecalculationTicket {
    pub generation: u64,
    pub request: RouteRequest,
}

#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub progress: NavigationProgress,
    pub announcement: Option<Announcement>,
    /// Set when the position put the traveler off route and a new route should be
    /// fetched
    pub recalculation: Option<RecalculationTicket>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecalculationOutcome {
    /// The new route is now active
    Applied {
        progress: NavigationProgress,
        announcement: Option<Announcement>,
    },
    /// A newer request superseded this one, or it was cancelled. Nothing changed.
    Stale,
    /// The latest request failed, the previous route stays active
    Failed(RoutingError),
}

/// All state for one navigation from a start to a destination.
///
/// The session itself never waits on anything; it hands out [RecalculationTicket]s
/// and expects the results back through [NavigationSession::complete_recalculation].
pub struct NavigationSession {
    id: Uuid,
    destination: Coordinate,
    options: RouteOptions,
    settings: NavigationSettings,
    tracker: ProgressTracker,
    announcer: Announcer,
    generation: u64,
    in_flight: Option<u64>,
    last_request: Option<Instant>,
}

impl NavigationSession {
    pub fn new(route: Route, options: RouteOptions, settings: NavigationSettings) -> Self {
        let id = Uuid::new_v4();
        info!(
            "Starting navigation session {id}, {} steps over {:.0}m",
            route.len(),
            route.total_distance_m()
        );
        Self {
            id,
            destination: route.destination(),
            options,
            announcer: Announcer::new(&settings),
            tracker: ProgressTracker::new(route, settings.clone()),
            settings,
            generation: 0,
            in_flight: None,
            last_request: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn destination(&self) -> Coordinate {
        self.destination
    }

    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    pub fn route(&self) -> &Route {
        self.tracker.route()
    }

    pub fn progress(&self) -> &NavigationProgress {
        self.tracker.progress()
    }

    pub fn announcer_state(&self) -> AnnouncerState {
        self.announcer.state()
    }

    pub fn is_arrived(&self) -> bool {
        self.tracker.is_arrived()
    }

    pub fn recalculation_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Opening announcement, only produced once per session
    pub fn begin(&mut self) -> Option<Announcement> {
        let progress = self.tracker.progress().clone();
        self.announcer.begin(&progress)
    }

    /// Feed a position sample through tracking and announcing.
    pub fn update(&mut self, position: Coordinate) -> Result<PositionUpdate, NavigationError> {
        let progress = self.tracker.update(position)?;
        let announcement = self.announcer.observe(&progress);

        let recalculation = (progress.off_route && self.can_request())
            .then(|| self.issue_ticket(position));

        Ok(PositionUpdate {
            progress,
            announcement,
            recalculation,
        })
    }

    /// Ask for a new route from the last known position right now, superseding any
    /// request still in flight. Does nothing once arrived.
    pub fn request_recalculation(&mut self) -> Option<RecalculationTicket> {
        if self.is_arrived() {
            return None;
        }
        let from = self
            .tracker
            .last_position()
            .unwrap_or_else(|| self.route().origin());
        Some(self.issue_ticket(from))
    }

    /// Hand back the result for a ticket. Only the latest ticket still in flight is
    /// accepted, everything else is stale.
    pub fn complete_recalculation(
        &mut self,
        generation: u64,
        result: Result<Route, RoutingError>,
    ) -> RecalculationOutcome {
        if self.in_flight != Some(generation) || self.is_arrived() {
            debug!(
                "Discarding stale recalculation {generation} (latest is {})",
                self.generation
            );
            return RecalculationOutcome::Stale;
        }

        self.in_flight = None;

        match result {
            Ok(route) => {
                info!(
                    "Recalculation {generation} applied, {} steps over {:.0}m",
                    route.len(),
                    route.total_distance_m()
                );
                let progress = self.tracker.install_route(route);
                let announcement = self.announcer.route_recalculated(&progress);
                RecalculationOutcome::Applied {
                    progress,
                    announcement,
                }
            }
            Err(why) => {
                warn!("Recalculation {generation} failed, keeping current route: {why}");
                RecalculationOutcome::Failed(why)
            }
        }
    }

    /// Forget about any request in flight, its result will be treated as stale
    pub fn cancel_recalculation(&mut self) {
        if let Some(generation) = self.in_flight.take() {
            debug!("Cancelled recalculation {generation}");
        }
    }

    fn can_request(&self) -> bool {
        self.last_request
            .is_none_or(|at| at.elapsed() >= self.settings.recalculation_interval())
    }

    fn issue_ticket(&mut self, from: Coordinate) -> RecalculationTicket {
        self.generation += 1;
        if let Some(previous) = self.in_flight.replace(self.generation) {
            debug!("Recalculation {previous} superseded by {}", self.generation);
        }
        self.last_request = Some(Instant::now());

        RecalculationTicket {
            generation: self.generation,
            request: RouteRequest {
                origin: from,
                destination: self.destination,
                options: self.options.clone(),
            },
        }
    }
}
