//! Ramen Compass: nearby ramen shop discovery service
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use ramen_compass::{
    config,
    network::HttpClient,
    places::GooglePlaces,
    summary::{GeminiSummarizer, SampleSummarizer, Summarizer},
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting Ramen Compass v{}", ramen_compass::VERSION);

    // Load configuration
    let settings = config::load()?;
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;
    info!("HTTP client initialized");

    // Providers
    let places = GooglePlaces::from_settings(client.clone(), &settings.places)
        .context("set places.api_key or RAMEN_PLACES_API_KEY")?;
    let summarizer: Arc<dyn Summarizer> =
        match GeminiSummarizer::from_settings(client, &settings.summarizer)? {
            Some(gemini) => Arc::new(gemini),
            None => {
                warn!("No summarizer API key configured, serving sample summaries");
                Arc::new(SampleSummarizer)
            }
        };

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);

    // Create application state
    let state = AppState::build(settings, Arc::new(places), summarizer).await?;
    info!("Application state initialized");

    let app = create_router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
