use actix_web::{web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use ppo_inference_rs::api::{self, AppState};
use ppo_inference_rs::config::Settings;
use ppo_inference_rs::inference::PpoInference;
use ppo_inference_rs::metrics;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables before reading settings
    dotenv::dotenv().ok();

    let settings = Settings::new()?;
    init_tracing(settings.json_logs());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model_path = %settings.model_path.display(),
        model_version = %settings.model_version,
        device = %settings.device,
        "PPO inference service starting"
    );

    // Never bind without a loaded policy
    metrics::set_model_ready(false);
    let inference = match PpoInference::load(&settings) {
        Ok(inference) => Arc::new(inference),
        Err(e) => {
            error!(error = %e, path = %settings.model_path.display(), "Failed to load policy");
            std::process::exit(1);
        }
    };
    metrics::set_model_ready(true);

    let state = web::Data::new(AppState::ready(inference));

    let prometheus = PrometheusMetricsBuilder::new("ppo_inference")
        .endpoint("/metrics")
        .registry(prometheus::default_registry().clone())
        .build()?;

    let bind_address = settings.bind_address();
    info!("Starting API server on {}", bind_address);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(prometheus.clone())
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
