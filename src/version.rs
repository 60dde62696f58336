// Package identity, for the startup log and outgoing HTTP requests.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `komari-traffic/<version>`
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
