use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::RoutingError,
    geo::Coordinate,
    route::{Maneuver, Route, RouteStep},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Walking,
    Driving,
    Bicycling,
}

impl TravelMode {
    /// Rough average speed used when a provider gives no durations, in m/s
    pub fn typical_speed_mps(&self) -> f64 {
        match self {
            Self::Walking => 1.4,
            Self::Bicycling => 4.5,
            Self::Driving => 8.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RouteOptions {
    pub mode: TravelMode,
    /// Preferred language for instructions (e.g. `en`, `af`, `zu`), provider default if unset
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub options: RouteOptions,
}

pub trait RoutingProvider: Send + Sync {
    /// Compute a fresh route for the request. Must be cancel safe, the navigator drops
    /// the future when a request is superseded or navigation stops.
    fn compute_route(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Route, RoutingError>> + Send;
}

/// Offline routing: walk straight at the destination, split into equal legs.
/// Good enough inside a mall when nothing better is reachable.
pub struct DirectRouting {
    legs: usize,
}

impl DirectRouting {
    pub fn new(legs: usize) -> Self {
        Self { legs: legs.max(1) }
    }

    pub fn build_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        let RouteRequest {
            origin,
            destination,
            options,
        } = request;

        let total = origin.distance_to(destination);
        // Already there, one arrival step
        let legs = if total < 1.0 { 1 } else { self.legs };
        let leg_duration = total / legs as f64 / options.mode.typical_speed_mps();

        let steps = (1..=legs)
            .map(|i| {
                let t = i as f64 / legs as f64;
                let (instruction, maneuver) = if i == legs {
                    ("Arrive at your destination", Maneuver::Arrive)
                } else {
                    ("Continue straight", Maneuver::Straight)
                };
                RouteStep::new(
                    origin.lerp(destination, t),
                    instruction,
                    maneuver,
                    total * t,
                    leg_duration,
                )
            })
            .collect();

        Route::new(*origin, *destination, steps)
            .map_err(|why| RoutingError::Provider(why.to_string()))
    }
}

impl Default for DirectRouting {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RoutingProvider for DirectRouting {
    async fn compute_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        self.build_route(request)
    }
}

/// Ask `primary` first, if it fails for a transient reason fall back to `fallback`.
/// [RoutingError::NoRoute] is passed through untouched.
pub struct FallbackRouting<P: RoutingProvider, F: RoutingProvider> {
    primary: P,
    fallback: F,
}

impl<P: RoutingProvider, F: RoutingProvider> FallbackRouting<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: RoutingProvider, F: RoutingProvider> RoutingProvider for FallbackRouting<P, F> {
    async fn compute_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        match self.primary.compute_route(request).await {
            Err(why) if why.is_transient() => {
                warn!("Primary routing failed ({why}), using fallback");
                self.fallback.compute_route(request).await
            }
            res => res,
        }
    }
}

pub trait RouteCache: Send + Sync {
    fn get(&self, request: &RouteRequest) -> Option<Route>;
    fn put(&self, request: &RouteRequest, route: &Route);
}

/// Coordinates rounded to 5 decimals (about a meter) plus the options
type CacheKey = (i64, i64, i64, i64, RouteOptions);

fn cache_key(request: &RouteRequest) -> CacheKey {
    let round = |deg: f64| (deg * 1e5).round() as i64;
    (
        round(request.origin.lat),
        round(request.origin.long),
        round(request.destination.lat),
        round(request.destination.long),
        request.options.clone(),
    )
}

#[derive(Default)]
struct CacheEntries {
    routes: HashMap<CacheKey, Route>,
    order: VecDeque<CacheKey>,
}

/// Bounded in-memory [RouteCache], drops the oldest entry when full
pub struct MemoryRouteCache {
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

impl MemoryRouteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .routes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteCache for MemoryRouteCache {
    fn get(&self, request: &RouteRequest) -> Option<Route> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.routes.get(&cache_key(request)).cloned()
    }

    fn put(&self, request: &RouteRequest, route: &Route) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = cache_key(request);

        if entries.routes.insert(key.clone(), route.clone()).is_none() {
            entries.order.push_back(key);
        }

        while entries.routes.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.routes.remove(&oldest);
            }
        }
    }
}

/// Check a [RouteCache] before asking the wrapped provider, remember what it returns
pub struct CachedRouting<R: RoutingProvider, C: RouteCache> {
    inner: R,
    cache: C,
}

impl<R: RoutingProvider, C: RouteCache> CachedRouting<R, C> {
    pub fn new(inner: R, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<R: RoutingProvider, C: RouteCache> RoutingProvider for CachedRouting<R, C> {
    async fn compute_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        if let Some(route) = self.cache.get(request) {
            debug!("Route cache hit");
            return Ok(route);
        }

        let route = self.inner.compute_route(request).await?;
        self.cache.put(request, &route);
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tests::ScriptedRouting;
    use tokio::test;

    const ORIGIN: Coordinate = Coordinate::new(-26.1076, 28.0567);
    const DESTINATION: Coordinate = Coordinate::new(-26.1070, 28.0580);

    fn mk_request() -> RouteRequest {
        RouteRequest {
            origin: ORIGIN,
            destination: DESTINATION,
            options: RouteOptions::default(),
        }
    }

    #[test]
    async fn test_direct_routing_splits_legs() {
        let route = DirectRouting::new(2)
            .compute_route(&mk_request())
            .await
            .expect("Failed to route");

        assert_eq!(route.len(), 2);
        assert_eq!(route.step(0).maneuver, Maneuver::Straight);
        assert_eq!(route.step(1).maneuver, Maneuver::Arrive);
        assert_eq!(route.step(1).coordinate, DESTINATION);

        let total = ORIGIN.distance_to(&DESTINATION);
        assert!((route.total_distance_m() - total).abs() < 1e-6);
        assert!((route.leg_length_m(0) - total / 2.0).abs() < 0.5);
        assert!((route.total_duration_s() - total / 1.4).abs() < 1e-6);
    }

    #[test]
    async fn test_direct_routing_already_there() {
        let request = RouteRequest {
            destination: ORIGIN,
            ..mk_request()
        };
        let route = DirectRouting::new(4)
            .compute_route(&request)
            .await
            .expect("Failed to route");
        assert_eq!(route.len(), 1);
        assert_eq!(route.step(0).maneuver, Maneuver::Arrive);
    }

    #[test]
    async fn test_direct_routing_rejects_invalid() {
        let request = RouteRequest {
            origin: Coordinate::new(f64::NAN, 0.0),
            ..mk_request()
        };
        let res = DirectRouting::default().compute_route(&request).await;
        assert!(matches!(res, Err(RoutingError::Provider(_))));
    }

    #[test]
    async fn test_fallback_on_transient_error() {
        let primary = ScriptedRouting::new();
        primary.push_err(Duration::ZERO, RoutingError::Timeout);
        primary.push_err(Duration::ZERO, RoutingError::NoRoute);
        let routing = FallbackRouting::new(primary, DirectRouting::default());

        let route = routing
            .compute_route(&mk_request())
            .await
            .expect("Fallback not used");
        assert_eq!(route.destination(), DESTINATION);

        let res = routing.compute_route(&mk_request()).await;
        assert_eq!(res, Err(RoutingError::NoRoute), "NoRoute should not fall back");
    }

    #[test]
    async fn test_cache_hits_skip_provider() {
        let inner = ScriptedRouting::new();
        let route = DirectRouting::default()
            .build_route(&mk_request())
            .expect("Failed to route");
        inner.push_ok(Duration::ZERO, route.clone());

        let routing = CachedRouting::new(inner, MemoryRouteCache::new(4));

        let first = routing.compute_route(&mk_request()).await;
        // Sub-meter jitter still hits
        let jittered = RouteRequest {
            origin: Coordinate::new(ORIGIN.lat + 1e-7, ORIGIN.long),
            ..mk_request()
        };
        let second = routing.compute_route(&jittered).await;

        assert_eq!(first, Ok(route.clone()));
        assert_eq!(second, Ok(route));
        assert_eq!(routing.inner.calls(), 1);
        assert_eq!(routing.cache().len(), 1);
    }

    #[test]
    async fn test_cache_errors_not_stored() {
        let inner = ScriptedRouting::new();
        inner.push_err(Duration::ZERO, RoutingError::Timeout);
        let routing = CachedRouting::new(inner, MemoryRouteCache::new(4));

        assert_eq!(
            routing.compute_route(&mk_request()).await,
            Err(RoutingError::Timeout)
        );
        assert!(routing.cache().is_empty());
    }

    #[test]
    async fn test_cache_evicts_oldest() {
        let cache = MemoryRouteCache::new(2);
        let direct = DirectRouting::default();
        let requests = (0..3)
            .map(|i| RouteRequest {
                destination: DESTINATION.offset_meters(i as f64 * 50.0, 0.0),
                ..mk_request()
            })
            .collect::<Vec<_>>();

        for request in requests.iter() {
            let route = direct.build_route(request).expect("Failed to route");
            cache.put(request, &route);
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&requests[0]).is_none(), "Oldest was not evicted");
        assert!(cache.get(&requests[2]).is_some());

        let walking = cache.get(&requests[1]);
        let driving = cache.get(&RouteRequest {
            options: RouteOptions {
                mode: TravelMode::Driving,
                language: None,
            },
            ..requests[1].clone()
        });
        assert!(walking.is_some());
        assert!(driving.is_none(), "Options are part of the key");
    }
}
