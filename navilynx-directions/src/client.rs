use log::{debug, warn};
use reqwest::{StatusCode, Url};

use navilynx_logic::{
    Route, RouteRequest, RoutingError, RoutingProvider, TravelMode, prelude::*,
};

use crate::{config::DirectionsConfig, response::DirectionsResponse};

fn mode_param(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Walking => "walking",
        TravelMode::Driving => "driving",
        TravelMode::Bicycling => "bicycling",
    }
}

fn map_request_error(why: reqwest::Error) -> RoutingError {
    if why.is_timeout() {
        RoutingError::Timeout
    } else {
        RoutingError::Provider(format!("Directions request failed: {why}"))
    }
}

/// [RoutingProvider] backed by a Google Directions compatible JSON API
pub struct DirectionsClient {
    http: reqwest::Client,
    base_url: Url,
    config: DirectionsConfig,
}

impl DirectionsClient {
    pub fn new(config: DirectionsConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("No directions API key set, requests will likely be denied");
        }

        let base_url = Url::parse(&config.url)
            .with_context(|| format!("Invalid directions URL \"{}\"", config.url))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &DirectionsConfig {
        &self.config
    }

    pub fn request_url(&self, request: &RouteRequest) -> Url {
        let RouteRequest {
            origin,
            destination,
            options,
        } = request;

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("origin", &format!("{},{}", origin.lat, origin.long))
                .append_pair(
                    "destination",
                    &format!("{},{}", destination.lat, destination.long),
                )
                .append_pair("mode", mode_param(options.mode));

            if let Some(language) = options.language.as_deref() {
                query.append_pair("language", language);
            }

            if let Some(key) = self.config.api_key.as_deref() {
                query.append_pair("key", key);
            }
        }

        url
    }

    async fn fetch(&self, request: &RouteRequest) -> Result<DirectionsResponse, RoutingError> {
        let resp = self
            .http
            .get(self.request_url(request))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(RoutingError::Provider(format!(
                "Directions server returned {status}"
            )));
        }

        let body = resp.text().await.map_err(map_request_error)?;
        DirectionsResponse::parse(&body)
    }
}

impl RoutingProvider for DirectionsClient {
    async fn compute_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        debug!(
            "Requesting directions ({}, {}) -> ({}, {})",
            request.origin.lat, request.origin.long, request.destination.lat, request.destination.long
        );

        let res = self
            .fetch(request)
            .await
            .and_then(|resp| resp.into_route(request));

        if let Err(why) = &res {
            warn!("Directions lookup failed: {why}");
        }

        res
    }
}
