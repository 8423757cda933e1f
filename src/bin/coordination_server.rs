use clap::Parser;
use ensemble_copilot::config::Config;
use ensemble_copilot::llm::GeminiClient;
use ensemble_copilot::server::CoordinationServer;
use log::{error, info, warn};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "coordination-server")]
#[command(about = "Owns the canonical sequence and fans edits out to connected clients")]
struct Cli {
    /// Bind address for the HTTP + WebSocket server
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: String,

    /// Gemini model used for natural-language sequence edits
    #[arg(long)]
    gemini_model: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let model = cli.gemini_model.unwrap_or(config.gemini_model);

    let llm = match config.gemini_api_key {
        Some(key) => match GeminiClient::new(key, model.clone()) {
            Ok(client) => {
                info!("LLM client configured (model={model})");
                Some(Arc::new(client))
            }
            Err(e) => {
                error!("failed to build LLM client: {e}");
                None
            }
        },
        None => {
            warn!("no Gemini API key configured; /speech will report errors until one is set");
            None
        }
    };

    info!("═══════════════════════════════════════════════");
    info!("  COORDINATION SERVER");
    info!("  Listening: http://{}", cli.addr);
    info!("  LLM edits: {}", if llm.is_some() { "enabled" } else { "disabled" });
    info!("═══════════════════════════════════════════════");

    let server = CoordinationServer::new(cli.addr, llm);
    server.run();
}
