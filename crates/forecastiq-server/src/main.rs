//! ForecastIQ: sales forecasting chat server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("FORECASTIQ_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn print_help() {
    println!("ForecastIQ: sales forecasting chat server");
    println!();
    println!("Usage: forecastiq [command]");
    println!();
    println!("Commands:");
    println!("  (none)    Start the server");
    println!("  help      Show this help message");
    println!();
    println!("Environment:");
    println!("  PORT                              HTTP port (default 3003)");
    println!("  FORECASTIQ_DATA_DIR               Data directory (default ./data)");
    println!("  FORECASTIQ_SEARCH_ENDPOINT        Search service root URL");
    println!("  FORECASTIQ_SEARCH_INDEX           Index name (default azureblob-index)");
    println!("  FORECASTIQ_SEARCH_API_KEY         Search api-key header");
    println!("  FORECASTIQ_SEARCH_TIMEOUT_SECS    Search call timeout (default 30)");
    println!("  FORECASTIQ_LLM_TIMEOUT_SECS       LLM call timeout (default 60)");
    println!("  AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT,");
    println!("  OPENAI_API_KEY, ANTHROPIC_API_KEY, GROQ_API_KEY");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'forecastiq help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = forecastiq_core::ForecastIqConfig::from_env(&data_dir)?;
    let port = config.port;

    let state = Arc::new(AppState::new(config)?);
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ForecastIQ server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
