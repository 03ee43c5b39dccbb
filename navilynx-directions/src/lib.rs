mod client;
mod config;
mod response;

pub use client::DirectionsClient;
pub use config::{DEFAULT_API_URL, DEFAULT_TIMEOUT, DirectionsConfig};
pub use response::{DirectionsResponse, strip_html};
