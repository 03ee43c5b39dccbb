use log::debug;
use serde::Deserialize;

use navilynx_logic::{
    Coordinate, Maneuver, Route, RouteRequest, RouteStep, RoutingError, turn_angle,
};

const ARRIVE_INSTRUCTION: &str = "Arrive at your destination";

#[derive(Debug, Clone, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<&LatLng> for Coordinate {
    fn from(value: &LatLng) -> Self {
        Coordinate::new(value.lat, value.lng)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextValue {
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiStep {
    pub html_instructions: String,
    pub distance: TextValue,
    pub duration: TextValue,
    pub start_location: LatLng,
    pub end_location: LatLng,
    #[serde(default)]
    pub maneuver: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLeg {
    pub start_location: LatLng,
    pub steps: Vec<ApiStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRoute {
    pub legs: Vec<ApiLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub routes: Vec<ApiRoute>,
}

/// Drop markup from an instruction, Google wraps road names in `<b>` and adds
/// `<div>` notes
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn maneuver_from_api(name: &str) -> Option<Maneuver> {
    let maneuver = match name {
        "turn-left" | "roundabout-left" => Maneuver::Left,
        "turn-right" | "roundabout-right" => Maneuver::Right,
        "turn-slight-left" | "keep-left" | "fork-left" | "ramp-left" => Maneuver::SlightLeft,
        "turn-slight-right" | "keep-right" | "fork-right" | "ramp-right" => Maneuver::SlightRight,
        "turn-sharp-left" => Maneuver::SharpLeft,
        "turn-sharp-right" => Maneuver::SharpRight,
        "uturn-left" | "uturn-right" => Maneuver::UTurn,
        "straight" | "merge" => Maneuver::Straight,
        _ => return None,
    };
    Some(maneuver)
}

impl DirectionsResponse {
    pub fn parse(body: &str) -> Result<Self, RoutingError> {
        serde_json::from_str(body)
            .map_err(|why| RoutingError::Provider(format!("Malformed directions response: {why}")))
    }

    /// Turn the first route in the response into a [Route].
    ///
    /// Google describes the maneuver at the *start* of each step, while a [RouteStep]
    /// describes what happens at its *end*, so each step takes its instruction from
    /// the one after it. The final step becomes the arrival.
    pub fn into_route(self, request: &RouteRequest) -> Result<Route, RoutingError> {
        match self.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" | "NOT_FOUND" => return Err(RoutingError::NoRoute),
            status => {
                let message = self.error_message.unwrap_or_default();
                return Err(RoutingError::Provider(
                    format!("{status} {message}").trim().to_string(),
                ));
            }
        }

        let Some(route) = self.routes.into_iter().next() else {
            return Err(RoutingError::NoRoute);
        };

        let origin = route
            .legs
            .first()
            .map(|leg| Coordinate::from(&leg.start_location))
            .unwrap_or(request.origin);

        let api_steps = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .collect::<Vec<_>>();

        debug!("Directions returned {} steps", api_steps.len());

        let mut travelled = 0.0;
        let steps = api_steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                travelled += step.distance.value;
                let end = Coordinate::from(&step.end_location);

                let (instruction, maneuver) = match api_steps.get(i + 1) {
                    Some(next) => {
                        let maneuver = next
                            .maneuver
                            .as_deref()
                            .and_then(maneuver_from_api)
                            .unwrap_or_else(|| {
                                Maneuver::from_turn_angle(turn_angle(
                                    &Coordinate::from(&step.start_location),
                                    &end,
                                    &Coordinate::from(&next.end_location),
                                ))
                            });
                        (strip_html(&next.html_instructions), maneuver)
                    }
                    None => (ARRIVE_INSTRUCTION.to_string(), Maneuver::Arrive),
                };

                RouteStep::new(end, instruction, maneuver, travelled, step.duration.value)
            })
            .collect::<Vec<_>>();

        if steps.is_empty() {
            return Err(RoutingError::NoRoute);
        }

        Route::new(origin, request.destination, steps)
            .map_err(|why| RoutingError::Provider(why.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navilynx_logic::RouteOptions;

    const SAMPLE: &str = r#"{
        "status": "OK",
        "geocoded_waypoints": [],
        "routes": [{
            "summary": "Rivonia Rd",
            "legs": [{
                "start_location": {"lat": -26.1076, "lng": 28.0567},
                "end_location": {"lat": -26.1060, "lng": 28.0590},
                "steps": [
                    {
                        "html_instructions": "Head <b>north</b> on <b>Rivonia Rd</b>",
                        "distance": {"text": "0.1 km", "value": 120},
                        "duration": {"text": "2 mins", "value": 90},
                        "start_location": {"lat": -26.1076, "lng": 28.0567},
                        "end_location": {"lat": -26.1065, "lng": 28.0567},
                        "travel_mode": "WALKING"
                    },
                    {
                        "html_instructions": "Turn <b>right</b> onto <b>5th St</b>",
                        "maneuver": "turn-right",
                        "distance": {"text": "0.2 km", "value": 200},
                        "duration": {"text": "3 mins", "value": 150},
                        "start_location": {"lat": -26.1065, "lng": 28.0567},
                        "end_location": {"lat": -26.1065, "lng": 28.0585},
                        "travel_mode": "WALKING"
                    },
                    {
                        "html_instructions": "Slight left<div style=\"font-size:0.9em\">Destination will be on the left</div>",
                        "distance": {"text": "60 m", "value": 60},
                        "duration": {"text": "1 min", "value": 45},
                        "start_location": {"lat": -26.1065, "lng": 28.0585},
                        "end_location": {"lat": -26.1060, "lng": 28.0590},
                        "travel_mode": "WALKING"
                    }
                ]
            }]
        }]
    }"#;

    fn mk_request() -> RouteRequest {
        RouteRequest {
            origin: Coordinate::new(-26.1076, 28.0567),
            destination: Coordinate::new(-26.1060, 28.0590),
            options: RouteOptions::default(),
        }
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("Turn <b>left</b> onto <b>Main&nbsp;St</b>"),
            "Turn left onto Main St"
        );
        assert_eq!(
            strip_html("Continue<div style=\"x\">Toll road</div>"),
            "Continue Toll road"
        );
        assert_eq!(strip_html("Plain"), "Plain");
    }

    #[test]
    fn test_sample_to_route() {
        let route = DirectionsResponse::parse(SAMPLE)
            .expect("Failed to parse")
            .into_route(&mk_request())
            .expect("Failed to convert");

        assert_eq!(route.len(), 3);

        let first = route.step(0);
        assert_eq!(first.instruction, "Turn right onto 5th St");
        assert_eq!(first.maneuver, Maneuver::Right);
        assert_eq!(first.distance_from_start_m, 120.0);

        let second = route.step(1);
        assert_eq!(second.instruction, "Slight left Destination will be on the left");
        // No maneuver field, worked out from the geometry (east then north-east)
        assert_eq!(second.maneuver, Maneuver::SlightLeft);

        let last = route.step(2);
        assert_eq!(last.maneuver, Maneuver::Arrive);
        assert_eq!(last.coordinate, Coordinate::new(-26.1060, 28.0590));

        assert_eq!(route.total_distance_m(), 380.0);
        assert_eq!(route.total_duration_s(), 285.0);
        assert_eq!(route.origin(), Coordinate::new(-26.1076, 28.0567));
    }

    #[test]
    fn test_status_mapping() {
        let zero = DirectionsResponse::parse(r#"{"status": "ZERO_RESULTS", "routes": []}"#)
            .expect("Failed to parse");
        assert_eq!(zero.into_route(&mk_request()), Err(RoutingError::NoRoute));

        let denied = DirectionsResponse::parse(
            r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        )
        .expect("Failed to parse");
        assert_eq!(
            denied.into_route(&mk_request()),
            Err(RoutingError::Provider(
                "REQUEST_DENIED The provided API key is invalid.".to_string()
            ))
        );
    }

    #[test]
    fn test_ok_without_routes() {
        let empty =
            DirectionsResponse::parse(r#"{"status": "OK", "routes": []}"#).expect("Failed to parse");
        assert_eq!(empty.into_route(&mk_request()), Err(RoutingError::NoRoute));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            DirectionsResponse::parse("<html>502</html>"),
            Err(RoutingError::Provider(_))
        ));
    }

    #[test]
    fn test_maneuver_names() {
        assert_eq!(maneuver_from_api("turn-sharp-left"), Some(Maneuver::SharpLeft));
        assert_eq!(maneuver_from_api("uturn-right"), Some(Maneuver::UTurn));
        assert_eq!(maneuver_from_api("keep-right"), Some(Maneuver::SlightRight));
        assert_eq!(maneuver_from_api("ferry"), None);
    }
}
