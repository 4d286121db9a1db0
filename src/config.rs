use std::time::Duration;

/// Client configuration, sourced from the environment in the same way the
/// server-side tools are. Every tunable has a default that matches the
/// production dashboard.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL for REST resources.
    pub base_url: String,
    /// WebSocket endpoint for push messages.
    pub ws_url: String,
    /// Identity sent in the connection handshake.
    pub username: String,
    pub password: Option<String>,
    /// Node box geometry and spacing for the tree layout.
    pub node_width: f64,
    pub node_height: f64,
    pub x_padding: f64,
    pub y_padding: f64,
    /// Wheel-zoom sensitivity.
    pub zoom_scale: f64,
    /// Margin added around the tree bounds before fitting to the viewport.
    pub fit_margin: f64,
    /// Capacity of the published-updates channel.
    pub update_channel_capacity: usize,
    /// REST request timeout.
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SERVER_BASE").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            ws_url: std::env::var("WS_URL").unwrap_or_else(|_| "ws://localhost:8080/messages".to_string()),
            username: std::env::var("DASHBOARD_USER").unwrap_or_else(|_| "dashboard".to_string()),
            password: std::env::var("DASHBOARD_PASSWORD").ok(),
            node_width: std::env::var("NODE_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(50.0),
            node_height: std::env::var("NODE_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(35.0),
            x_padding: std::env::var("X_PADDING").ok().and_then(|v| v.parse().ok()).unwrap_or(50.0),
            y_padding: std::env::var("Y_PADDING").ok().and_then(|v| v.parse().ok()).unwrap_or(60.0),
            zoom_scale: std::env::var("ZOOM_SCALE").ok().and_then(|v| v.parse().ok()).unwrap_or(0.01),
            fit_margin: std::env::var("FIT_MARGIN").ok().and_then(|v| v.parse().ok()).unwrap_or(20.0),
            update_channel_capacity: std::env::var("UPDATE_CHANNEL_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(256),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            ws_url: "ws://localhost:8080/messages".to_string(),
            username: "dashboard".to_string(),
            password: None,
            node_width: 50.0,
            node_height: 35.0,
            x_padding: 50.0,
            y_padding: 60.0,
            zoom_scale: 0.01,
            fit_margin: 20.0,
            update_channel_capacity: 256,
            request_timeout: Duration::from_secs(30),
        }
    }
}
