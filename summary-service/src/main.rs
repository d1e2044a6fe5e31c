use summary_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "summary_service=debug,summary_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env();
    if config.api_key.is_none() {
        error!("OPENROUTER_API_KEY not set");
        std::process::exit(1);
    }

    info!(
        profile = %config.profile.profile(),
        mode = ?config.profile.mode,
        model = %config.model,
        prompt_dir = %config.prompt_dir.display(),
        "Configuration resolved"
    );

    let app = create_app(&config)?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Medical Summary Service starting on {}", addr);
    info!("API Documentation available at http://{}/", addr);
    info!("Summary endpoint: POST http://{}/summaries", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
