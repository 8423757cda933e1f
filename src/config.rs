//! Environment-derived credentials/endpoints, degrading to defaults rather
//! than panicking on missing input.

use log::info;

const DEFAULT_SERVER_WS: &str = "ws://localhost:8000/ws";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Service endpoints and credentials read once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub server_url: Option<String>,
    pub server_ws: String,
    pub camera_src: Option<String>,
    pub gemini_model: String,
}

impl Config {
    /// Reads `GEMINI_API_KEY`/`GOOGLE_API_KEY`, `COPILOT_SERVER_URL`,
    /// `COPILOT_SERVER_WS`, `CAMERA_SRC`, `GEMINI_MODEL` from the process
    /// environment, falling back to defaults for anything unset. Never
    /// panics — missing credentials surface later as `LlmError` when a
    /// client actually needs them.
    pub fn from_env() -> Self {
        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        let server_url = std::env::var("COPILOT_SERVER_URL").ok();
        let server_ws =
            std::env::var("COPILOT_SERVER_WS").unwrap_or_else(|_| DEFAULT_SERVER_WS.to_string());
        let camera_src = std::env::var("CAMERA_SRC").ok();
        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        if gemini_api_key.is_none() {
            info!("no GEMINI_API_KEY/GOOGLE_API_KEY set; /speech will return errors until configured");
        }

        Self {
            gemini_api_key,
            server_url,
            server_ws,
            camera_src,
            gemini_model,
        }
    }
}
