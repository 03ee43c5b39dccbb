mod announcer;
mod error;
mod geo;
mod navigator;
mod phrasing;
mod progress;
mod route;
mod routing;
mod session;
mod settings;

pub use announcer::{Announcement, AnnouncementKind, Announcer, AnnouncerState};
pub use error::{NavigationError, RoutingError};
pub use geo::{Coordinate, EARTH_RADIUS_M, distance, turn_angle};
pub use navigator::{
    NavigationEvent, NavigationOutcome, NavigationUpdateSender, Navigator, PositionSource,
};
pub use phrasing::{PhraseContext, Tone, phrase, spoken_distance};
pub use progress::{ARRIVAL_INSTRUCTION, NavigationProgress, ProgressTracker, UtcDT};
pub use route::{Maneuver, Route, RouteStep};
pub use routing::{
    CachedRouting, DirectRouting, FallbackRouting, MemoryRouteCache, RouteCache, RouteOptions,
    RouteRequest, RoutingProvider, TravelMode,
};
pub use session::{
    NavigationSession, PositionUpdate, RecalculationOutcome, RecalculationTicket,
};
pub use settings::{NavigationSettings, ProgressMode};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
