use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    announcer::Announcement,
    error::{NavigationError, RoutingError},
    geo::Coordinate,
    prelude::*,
    progress::NavigationProgress,
    route::Route,
    routing::{RouteOptions, RouteRequest, RoutingProvider},
    session::{NavigationSession, RecalculationOutcome, RecalculationTicket},
    settings::NavigationSettings,
};

/// Where positions come from (GPS, indoor positioning, a recorded track)
pub trait PositionSource: Send + Sync {
    /// Wait for the next position sample, `None` once the source is exhausted.
    /// Must be cancel safe.
    fn next_position(&self) -> impl Future<Output = Option<Coordinate>> + Send;
}

/// Whatever presents navigation to the user
pub trait NavigationUpdateSender: Send + Sync {
    fn send_event(&self, event: NavigationEvent);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NavigationEvent {
    Progress(NavigationProgress),
    Announcement(Announcement),
    /// A recalculated route is now active
    Rerouted(Route),
    RecalculationFailed(RoutingError),
    /// An invalid position sample was ignored
    PositionRejected(Coordinate),
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationOutcome {
    Arrived,
    /// [Navigator::stop] was called
    Stopped,
    /// The position source ran dry before arrival
    PositionsExhausted,
}

type RecalculationResult = (u64, Result<Route, RoutingError>);

type QueuePair<T> = (mpsc::Sender<T>, Mutex<mpsc::Receiver<T>>);

/// Drives a [NavigationSession] from a [PositionSource], fetching new routes in the
/// background whenever the session asks for one.
pub struct Navigator<P: PositionSource, R: RoutingProvider, S: NavigationUpdateSender> {
    session: Mutex<NavigationSession>,
    positions: P,
    routing: Arc<R>,
    updates: S,
    results: QueuePair<RecalculationResult>,
    /// Generation and cancel token of the newest request spawned
    pending: Mutex<Option<(u64, CancellationToken)>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<P: PositionSource, R: RoutingProvider + 'static, S: NavigationUpdateSender>
    Navigator<P, R, S>
{
    /// Compute the initial route and set up a navigator for it.
    ///
    /// Routing failures are returned with context attached, the underlying
    /// [RoutingError] can be recovered with `downcast_ref`.
    pub async fn start(
        request: RouteRequest,
        settings: NavigationSettings,
        positions: P,
        routing: Arc<R>,
        updates: S,
    ) -> Result<Self> {
        request.origin.validate()?;
        request.destination.validate()?;

        let route = routing
            .compute_route(&request)
            .await
            .context("Failed to compute initial route")?;

        Ok(Self::new(
            route,
            request.options,
            settings,
            positions,
            routing,
            updates,
        ))
    }

    pub fn new(
        route: Route,
        options: RouteOptions,
        settings: NavigationSettings,
        positions: P,
        routing: Arc<R>,
        updates: S,
    ) -> Self {
        let (tx, rx) = mpsc::channel(8);
        Self {
            timeout: settings.recalculation_timeout(),
            session: Mutex::new(NavigationSession::new(route, options, settings)),
            positions,
            routing,
            updates,
            results: (tx, Mutex::new(rx)),
            pending: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn lock_session(&self) -> MutexGuard<'_, NavigationSession> {
        self.session.lock().await
    }

    pub async fn clone_progress(&self) -> NavigationProgress {
        self.session.lock().await.progress().clone()
    }

    pub async fn clone_route(&self) -> Route {
        self.session.lock().await.route().clone()
    }

    /// Stop navigating, anything in flight is cancelled and its result dropped
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.session.lock().await.cancel_recalculation();
    }

    /// Ask for a new route right away. Returns `false` if there's nothing left to
    /// route to.
    pub async fn reroute(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.request_recalculation() {
            Some(ticket) => {
                self.spawn_recalculation(ticket).await;
                true
            }
            None => false,
        }
    }

    /// Callers hold the session lock so tickets get here in the order they were issued.
    /// A ticket older than the one already pending is dropped, never spawned.
    async fn spawn_recalculation(&self, ticket: RecalculationTicket) {
        let token = {
            let mut pending = self.pending.lock().await;
            if let Some((newest, _)) = pending.as_ref().filter(|(g, _)| *g > ticket.generation) {
                debug!(
                    "Route request {} already superseded by {newest}",
                    ticket.generation
                );
                return;
            }

            let token = self.cancel.child_token();
            if let Some((_, previous)) = pending.replace((ticket.generation, token.clone())) {
                previous.cancel();
            }
            token
        };

        let routing = self.routing.clone();
        let tx = self.results.0.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let RecalculationTicket {
                generation,
                request,
            } = ticket;

            debug!("Requesting route {generation}");

            let result = tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!("Route request {generation} cancelled");
                    return;
                }

                res = tokio::time::timeout(timeout, routing.compute_route(&request)) => {
                    match res {
                        Ok(res) => res,
                        Err(_) => Err(RoutingError::Timeout),
                    }
                }
            };

            if let Err(why) = tx.send((generation, result)).await {
                error!("Couldn't hand back route {generation}: {why:?}");
            }
        });
    }

    async fn handle_recalculation(&self, generation: u64, result: Result<Route, RoutingError>) {
        let mut session = self.session.lock().await;
        match session.complete_recalculation(generation, result) {
            RecalculationOutcome::Applied {
                progress,
                announcement,
            } => {
                self.clear_pending(generation).await;
                self.updates
                    .send_event(NavigationEvent::Rerouted(session.route().clone()));
                if let Some(announcement) = announcement {
                    self.updates
                        .send_event(NavigationEvent::Announcement(announcement));
                }
                self.updates.send_event(NavigationEvent::Progress(progress));
            }
            RecalculationOutcome::Stale => {}
            RecalculationOutcome::Failed(why) => {
                self.clear_pending(generation).await;
                self.updates
                    .send_event(NavigationEvent::RecalculationFailed(why));
            }
        }
    }

    async fn clear_pending(&self, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending
            .as_ref()
            .is_some_and(|(newest, _)| *newest == generation)
        {
            *pending = None;
        }
    }

    /// Returns `true` once arrived
    async fn handle_position(&self, position: Coordinate) -> bool {
        let update = {
            let mut session = self.session.lock().await;
            let mut update = session.update(position);
            let ticket = update
                .as_mut()
                .ok()
                .and_then(|update| update.recalculation.take());
            if let Some(ticket) = ticket {
                self.spawn_recalculation(ticket).await;
            }
            update
        };

        match update {
            Ok(update) => {
                let arrived = update.progress.arrived;
                self.updates
                    .send_event(NavigationEvent::Progress(update.progress));
                if let Some(announcement) = update.announcement {
                    self.updates
                        .send_event(NavigationEvent::Announcement(announcement));
                }
                if arrived {
                    self.updates.send_event(NavigationEvent::Arrived);
                }
                arrived
            }
            Err(NavigationError::InvalidCoordinate(coord)) => {
                warn!("Ignoring invalid position ({}, {})", coord.lat, coord.long);
                self.updates
                    .send_event(NavigationEvent::PositionRejected(coord));
                false
            }
            Err(why) => {
                warn!("Ignoring position: {why}");
                false
            }
        }
    }

    /// Main loop of a navigation session, runs until arrival, [Navigator::stop], or
    /// the position source running out.
    pub async fn main_loop(&self) -> NavigationOutcome {
        let mut results = self.results.1.lock().await;

        {
            let mut session = self.session.lock().await;
            if let Some(announcement) = session.begin() {
                self.updates
                    .send_event(NavigationEvent::Announcement(announcement));
            }
            self.updates
                .send_event(NavigationEvent::Progress(session.progress().clone()));
        }

        let outcome = 'nav: loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    break 'nav NavigationOutcome::Stopped;
                }

                Some((generation, result)) = results.recv() => {
                    self.handle_recalculation(generation, result).await;
                }

                position = self.positions.next_position() => {
                    match position {
                        Some(position) => {
                            if self.handle_position(position).await {
                                break 'nav NavigationOutcome::Arrived;
                            }
                        }
                        None => {
                            break 'nav NavigationOutcome::PositionsExhausted;
                        }
                    }
                }
            }
        };

        self.cancel.cancel();
        self.session.lock().await.cancel_recalculation();

        info!("Navigation ended: {outcome:?}");

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        announcer::AnnouncementKind,
        routing::DirectRouting,
        tests::{MockPositions, RecordingSender, ScriptedRouting},
    };
    use tokio::test;

    const ORIGIN: Coordinate = Coordinate::new(-33.9249, 18.4241);

    fn mk_settings() -> NavigationSettings {
        NavigationSettings {
            phrase_seed: 7,
            recalculation_timeout_secs: 10,
            recalculation_interval_secs: 5,
            ..Default::default()
        }
    }

    fn destination() -> Coordinate {
        ORIGIN.offset_meters(400.0, 0.0)
    }

    fn mk_request(origin: Coordinate) -> RouteRequest {
        RouteRequest {
            origin,
            destination: destination(),
            options: RouteOptions::default(),
        }
    }

    fn direct_route(origin: Coordinate, legs: usize) -> Route {
        DirectRouting::new(legs)
            .build_route(&mk_request(origin))
            .expect("Failed to route")
    }

    type TestNavigator<R> = Navigator<MockPositions, R, RecordingSender>;

    fn mk_navigator<R: RoutingProvider + 'static>(
        routing: R,
    ) -> (
        Arc<TestNavigator<R>>,
        mpsc::Sender<Coordinate>,
        RecordingSender,
    ) {
        let (tx, positions) = MockPositions::create();
        let updates = RecordingSender::default();
        let navigator = Navigator::new(
            direct_route(ORIGIN, 2),
            RouteOptions::default(),
            mk_settings(),
            positions,
            Arc::new(routing),
            updates.clone(),
        );
        (Arc::new(navigator), tx, updates)
    }

    /// Let every ready task run before looking at the results
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test(start_paused = true)]
    async fn test_walk_to_destination() {
        let (navigator, tx, updates) = mk_navigator(DirectRouting::default());
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        for i in 0..=40 {
            tx.send(ORIGIN.offset_meters(i as f64 * 10.0, 0.0))
                .await
                .expect("Navigator went away");
        }

        let outcome = handle.await.expect("Failed to join");
        assert_eq!(outcome, NavigationOutcome::Arrived);

        let progress = updates.progress();
        assert!(progress.iter().all(|p| !p.off_route));
        assert!(progress.windows(2).all(|w| w[1].fraction >= w[0].fraction));
        let last = progress.last().expect("No progress sent");
        assert!(last.arrived);
        assert_eq!(last.fraction, 1.0);

        let kinds = updates.announcement_kinds();
        assert_eq!(kinds.first(), Some(&AnnouncementKind::Depart));
        assert_eq!(kinds.last(), Some(&AnnouncementKind::Arrived));
        assert_eq!(updates.events().last(), Some(&NavigationEvent::Arrived));
        assert_eq!(updates.count(|e| matches!(e, NavigationEvent::Rerouted(_))), 0);
    }

    #[test(start_paused = true)]
    async fn test_off_route_reroutes() {
        let (navigator, tx, updates) = mk_navigator(DirectRouting::new(3));
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        let off = ORIGIN.offset_meters(50.0, 300.0);
        tx.send(off).await.unwrap();
        settle().await;

        assert_eq!(
            updates.count(|e| matches!(e, NavigationEvent::Rerouted(_))),
            1
        );
        let route = navigator.clone_route().await;
        assert_eq!(route.origin(), off);
        assert_eq!(route.len(), 3);
        assert!(
            updates
                .announcement_kinds()
                .contains(&AnnouncementKind::Recalculated)
        );
        assert!(!navigator.clone_progress().await.off_route);

        navigator.stop().await;
        assert_eq!(handle.await.unwrap(), NavigationOutcome::Stopped);
    }

    #[test(start_paused = true)]
    async fn test_slow_routing_times_out() {
        let routing = ScriptedRouting::new();
        routing.push_ok(Duration::from_secs(60), direct_route(ORIGIN, 5));
        let (navigator, tx, updates) = mk_navigator(routing);
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        tx.send(ORIGIN.offset_meters(50.0, 300.0)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;

        assert_eq!(
            updates.count(|e| *e == NavigationEvent::RecalculationFailed(RoutingError::Timeout)),
            1
        );
        assert_eq!(navigator.clone_route().await, direct_route(ORIGIN, 2));

        navigator.stop().await;
        handle.await.unwrap();
    }

    #[test(start_paused = true)]
    async fn test_latest_reroute_wins() {
        let first_from = ORIGIN.offset_meters(50.0, 300.0);
        let second_from = ORIGIN.offset_meters(50.0, -300.0);

        let routing = ScriptedRouting::new();
        routing.push_ok(Duration::from_secs(8), direct_route(first_from, 4));
        routing.push_ok(Duration::from_secs(1), direct_route(second_from, 3));

        let (navigator, tx, updates) = mk_navigator(routing);
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        tx.send(first_from).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        tx.send(second_from).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(navigator.clone_route().await.origin(), second_from);

        // Long after the first request would have resolved
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        let rerouted = updates
            .events()
            .into_iter()
            .filter_map(|e| match e {
                NavigationEvent::Rerouted(route) => Some(route),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(rerouted.len(), 1);
        assert_eq!(rerouted[0].origin(), second_from);
        assert_eq!(navigator.clone_route().await.origin(), second_from);

        navigator.stop().await;
        handle.await.unwrap();
    }

    #[test(start_paused = true)]
    async fn test_older_ticket_cannot_replace_newer() {
        let newer_from = ORIGIN.offset_meters(50.0, -300.0);
        let routing = ScriptedRouting::new();
        routing.push_ok(Duration::from_secs(1), direct_route(newer_from, 3));

        let (navigator, _tx, updates) = mk_navigator(routing);
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        let (older, newer) = {
            let mut session = navigator.lock_session().await;
            let older = session.request_recalculation().expect("No ticket");
            let newer = session.request_recalculation().expect("No ticket");
            (older, newer)
        };
        let newest = newer.generation;
        assert!(older.generation < newest);

        // Registered newest first, the way two callers could race each other
        navigator.spawn_recalculation(newer).await;
        navigator.spawn_recalculation(older).await;

        let (generation, token) = navigator
            .pending
            .lock()
            .await
            .clone()
            .expect("Nothing pending");
        assert_eq!(generation, newest);
        assert!(!token.is_cancelled(), "Newer request was cancelled");

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(navigator.routing.calls(), 1);
        assert_eq!(
            updates.count(|e| matches!(e, NavigationEvent::Rerouted(_))),
            1
        );
        assert_eq!(navigator.clone_route().await.origin(), newer_from);
        assert!(navigator.pending.lock().await.is_none());

        navigator.stop().await;
        handle.await.unwrap();
    }

    #[test(start_paused = true)]
    async fn test_stop_cancels_in_flight() {
        let routing = ScriptedRouting::new();
        routing.push_ok(Duration::from_secs(5), direct_route(ORIGIN, 5));
        let (navigator, tx, updates) = mk_navigator(routing);
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        tx.send(ORIGIN.offset_meters(50.0, 300.0)).await.unwrap();
        settle().await;
        assert!(navigator.lock_session().await.recalculation_in_flight());

        navigator.stop().await;
        assert_eq!(handle.await.unwrap(), NavigationOutcome::Stopped);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        assert_eq!(
            updates.count(|e| matches!(
                e,
                NavigationEvent::Rerouted(_) | NavigationEvent::RecalculationFailed(_)
            )),
            0
        );
        assert_eq!(navigator.clone_route().await, direct_route(ORIGIN, 2));
    }

    #[test(start_paused = true)]
    async fn test_manual_reroute() {
        let routing = ScriptedRouting::new();
        routing.push_ok(Duration::from_secs(1), direct_route(ORIGIN, 4));
        let (navigator, _tx, updates) = mk_navigator(routing);
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        assert!(navigator.reroute().await);
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(navigator.clone_route().await.len(), 4);
        assert_eq!(
            updates.count(|e| matches!(e, NavigationEvent::Rerouted(_))),
            1
        );

        navigator.stop().await;
        handle.await.unwrap();
    }

    #[test(start_paused = true)]
    async fn test_invalid_positions_skipped() {
        let (navigator, tx, updates) = mk_navigator(DirectRouting::default());
        let handle = tokio::spawn({
            let navigator = navigator.clone();
            async move { navigator.main_loop().await }
        });

        let bad = Coordinate::new(f64::NAN, 18.0);
        tx.send(bad).await.unwrap();
        tx.send(ORIGIN.offset_meters(10.0, 0.0)).await.unwrap();
        drop(tx);

        assert_eq!(
            handle.await.unwrap(),
            NavigationOutcome::PositionsExhausted
        );
        assert_eq!(
            updates.count(|e| matches!(e, NavigationEvent::PositionRejected(_))),
            1
        );
        // Initial progress plus the valid sample
        assert_eq!(updates.progress().len(), 2);
    }

    #[test]
    async fn test_start_no_route() {
        let routing = ScriptedRouting::new();
        routing.push_err(Duration::ZERO, RoutingError::NoRoute);
        let (_tx, positions) = MockPositions::create();

        let res = Navigator::start(
            mk_request(ORIGIN),
            mk_settings(),
            positions,
            Arc::new(routing),
            RecordingSender::default(),
        )
        .await;

        let err = res.err().expect("Started without a route");
        assert_eq!(
            err.downcast_ref::<RoutingError>(),
            Some(&RoutingError::NoRoute)
        );
    }

    #[test]
    async fn test_start_rejects_invalid_destination() {
        let (_tx, positions) = MockPositions::create();
        let request = RouteRequest {
            destination: Coordinate::new(0.0, 200.0),
            ..mk_request(ORIGIN)
        };

        let res = Navigator::start(
            request,
            mk_settings(),
            positions,
            Arc::new(DirectRouting::default()),
            RecordingSender::default(),
        )
        .await;

        let err = res.err().expect("Started with a bad destination");
        assert!(matches!(
            err.downcast_ref::<NavigationError>(),
            Some(NavigationError::InvalidCoordinate(_))
        ));
    }
}
