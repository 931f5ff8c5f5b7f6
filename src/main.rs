use gha_badge::application::use_cases::generate_badge::GenerateBadgeInteractor;
use gha_badge::infrastructures::adapters::primary::web::{AppState, create_router};
use gha_badge::infrastructures::bootstrap;
use gha_badge::infrastructures::config::Config;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> anyhow::Result<Option<SdkTracerProvider>> {
    // Export spans only when an OTLP collector is configured
    let provider = if env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create OTLP exporter: {}", e))?;
        Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(otlp_exporter)
                .build(),
        )
    } else {
        None
    };
    let telemetry = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer("gha-badge")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(telemetry)
        .with(fmt_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider = init_tracing()?;

    let (app, addr) = async {
        info!("Application starting");

        let config = Config::from_env()?;

        // Build dependencies
        let github_app = Arc::new(bootstrap::github_app(&config).await?);
        let use_case = Arc::new(GenerateBadgeInteractor::new(github_app));
        let app_state = Arc::new(AppState {
            use_case,
            badge_service_url: config.badge_service_url.clone(),
        });

        anyhow::Ok((
            create_router(app_state),
            SocketAddr::from(([0, 0, 0, 0], config.port)),
        ))
    }
    .instrument(info_span!("initialize"))
    .await?;

    // Start server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    if let Some(provider) = provider {
        provider.shutdown()?;
    }
    Ok(())
}
