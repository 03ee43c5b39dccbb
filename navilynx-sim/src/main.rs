use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};

use navilynx_directions::{DirectionsClient, DirectionsConfig};
use navilynx_logic::{
    CachedRouting, Coordinate, DirectRouting, FallbackRouting, MemoryRouteCache,
    NavigationOutcome, NavigationSettings, Navigator, RouteOptions, RouteRequest,
    RoutingProvider, Tone, TravelMode,
};
use navilynx_sim::{
    JsonLineSender, TrackPositions, WalkPlan, load_settings, load_track, parse_coordinate,
    prelude::*,
};

#[derive(Parser)]
/// Simulate a navigation session and print every event as a JSON line
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToneValue {
    Neutral,
    Concise,
    Friendly,
}

impl From<ToneValue> for Tone {
    fn from(value: ToneValue) -> Self {
        match value {
            ToneValue::Neutral => Tone::Neutral,
            ToneValue::Concise => Tone::Concise,
            ToneValue::Friendly => Tone::Friendly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeValue {
    Walking,
    Driving,
    Bicycling,
}

impl From<ModeValue> for TravelMode {
    fn from(value: ModeValue) -> Self {
        match value {
            ModeValue::Walking => TravelMode::Walking,
            ModeValue::Driving => TravelMode::Driving,
            ModeValue::Bicycling => TravelMode::Bicycling,
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Where to start
    #[arg(long, global = true, value_parser = parse_coordinate)]
    from: Option<Coordinate>,

    /// Where to go
    #[arg(long, global = true, value_parser = parse_coordinate)]
    to: Option<Coordinate>,

    /// Number of legs offline routes are split into
    #[arg(long, global = true, default_value_t = 2)]
    steps: usize,

    /// Time between position samples
    #[arg(long, global = true, default_value_t = 200)]
    interval_ms: u64,

    /// JSON file with navigation settings
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Announcement phrasing
    #[arg(long, global = true, value_enum)]
    tone: Option<ToneValue>,

    #[arg(long, global = true, value_enum, default_value_t = ModeValue::Walking)]
    mode: ModeValue,

    /// Instruction language passed on to the directions API
    #[arg(long, global = true)]
    language: Option<String>,

    /// Use the directions API with this key, falling back to straight lines
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Override the arrival threshold from settings
    #[arg(long, global = true)]
    arrival_threshold_m: Option<f64>,

    /// Override the off-route threshold from settings
    #[arg(long, global = true)]
    off_route_threshold_m: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a generated track from start to destination
    Walk {
        /// Number of position samples along the way
        #[arg(long, default_value_t = 40)]
        samples: usize,
        /// Constant sideways error on every sample
        #[arg(long, default_value_t = 0.0)]
        lateral_offset_m: f64,
        /// Sideways bulge at the midpoint, large values force a reroute
        #[arg(long, default_value_t = 0.0)]
        detour_m: f64,
    },
    /// Replay a recorded track
    Replay {
        /// JSON array of {"lat", "long"} objects or [lat, long] pairs
        #[arg(long)]
        track: PathBuf,
    },
}

impl CommonArgs {
    fn settings(&self) -> Result<NavigationSettings> {
        let mut settings = load_settings(self.settings.as_deref())?;
        if let Some(tone) = self.tone {
            settings.tone = tone.into();
        }
        if let Some(threshold) = self.arrival_threshold_m {
            settings.arrival_threshold_m = threshold;
        }
        if let Some(threshold) = self.off_route_threshold_m {
            settings.off_route_threshold_m = threshold;
        }
        Ok(settings)
    }

    fn request(&self) -> Result<RouteRequest> {
        let origin = self.from.context("--from is required")?;
        let destination = self.to.context("--to is required")?;
        Ok(RouteRequest {
            origin,
            destination,
            options: RouteOptions {
                mode: self.mode.into(),
                language: self.language.clone(),
            },
        })
    }
}

async fn navigate<R: RoutingProvider + 'static>(
    routing: R,
    request: RouteRequest,
    settings: NavigationSettings,
    positions: TrackPositions,
) -> Result<NavigationOutcome> {
    let navigator = Navigator::start(
        request,
        settings,
        positions,
        Arc::new(routing),
        JsonLineSender::stdout(),
    )
    .await?;
    let navigator = Arc::new(navigator);

    tokio::spawn({
        let navigator = navigator.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping");
                navigator.stop().await;
            }
        }
    });

    Ok(navigator.main_loop().await)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    colog::init();

    let cli = Cli::parse();
    let common = &cli.common;

    let settings = common.settings()?;
    let request = common.request()?;

    let track = match &cli.command {
        Commands::Walk {
            samples,
            lateral_offset_m,
            detour_m,
        } => WalkPlan {
            from: request.origin,
            to: request.destination,
            samples: *samples,
            lateral_offset_m: *lateral_offset_m,
            detour_m: *detour_m,
        }
        .track(),
        Commands::Replay { track } => load_track(track)?,
    };

    if track.is_empty() {
        bail!("Track has no positions");
    }

    info!("Navigating over {} position samples", track.len());

    let positions = TrackPositions::new(track, Duration::from_millis(common.interval_ms));
    let offline = DirectRouting::new(common.steps);
    let cache = MemoryRouteCache::new(32);

    let outcome = match &common.api_key {
        Some(key) => {
            let client = DirectionsClient::new(DirectionsConfig::default().with_api_key(key))?;
            let routing = CachedRouting::new(FallbackRouting::new(client, offline), cache);
            navigate(routing, request, settings, positions).await?
        }
        None => {
            let routing = CachedRouting::new(offline, cache);
            navigate(routing, request, settings, positions).await?
        }
    };

    println!("{}", serde_json::json!({ "outcome": outcome }));

    Ok(match outcome {
        NavigationOutcome::Arrived => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    })
}
