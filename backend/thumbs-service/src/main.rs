/// Thumbs Service - queue worker and HTTP server
///
/// Consumes photo upload events, generates thumbnails and serves them.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use thumbs_service::broker::subscriber::start_consuming;
use thumbs_service::broker::{
    declare_topology, AmqpPublisher, BrokerSession, EventPublisher, Subscriber,
};
use thumbs_service::db::{PgPhotoRepository, PhotoRepository};
use thumbs_service::handlers::{self, ApiState};
use thumbs_service::lifecycle::{shutdown_signal, supervise, Outcome};
use thumbs_service::services::thumbnail::{
    MessageHandler, ThumbnailConsumer, ThumbnailProcessor, ThumbnailWorker, WorkerBundle,
};
use thumbs_service::storage::{build_object_stores, ObjectStores};
use thumbs_service::Config;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let code = match run().await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "Thumbs service failed to start");
            1
        }
    };

    info!(exit_code = code, "Thumbs service stopped");
    std::process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "thumbs_service=info,object_storage=info,actix_web=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Startup in strict order; any failure aborts before the next step.
async fn run() -> anyhow::Result<Outcome> {
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        dimensions = ?config.thumbs.dimensions,
        quality = config.thumbs.quality,
        "Configuration loaded"
    );

    let repository = PgPhotoRepository::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    repository
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    let stores = build_object_stores(&config.storage)
        .await
        .context("Failed to initialize object storage")?;

    let broker = BrokerSession::connect(&config.broker.url)
        .await
        .context("Failed to connect to RabbitMQ")?;

    let outcome = serve(&config, &broker, Arc::new(repository), stores).await;
    broker.close().await;
    outcome
}

async fn serve(
    config: &Config,
    broker: &BrokerSession,
    repository: Arc<dyn PhotoRepository>,
    stores: ObjectStores,
) -> anyhow::Result<Outcome> {
    declare_topology(broker.consume_channel(), &config.broker)
        .await
        .context("Failed to declare broker topology")?;
    let deliveries = start_consuming(broker.consume_channel(), &config.broker)
        .await
        .context("Failed to start consuming")?;

    let publisher: Arc<dyn EventPublisher> =
        Arc::new(AmqpPublisher::new(broker.publish_channel().clone()));
    let worker = Arc::new(ThumbnailWorker::new(WorkerBundle {
        photo_storage: stores.photos,
        thumb_storage: Arc::clone(&stores.thumbs),
        repository: Arc::clone(&repository),
        processor: Arc::new(ThumbnailProcessor::new(config.thumbs.quality)),
        publisher,
        completion_exchange: config.broker.worker_exchange.clone(),
        dimensions: config.thumbs.dimensions.clone(),
    }));
    let consumer: Arc<dyn MessageHandler> = Arc::new(ThumbnailConsumer::new(worker));
    let subscriber = Subscriber::new(consumer, config.broker.nack_requeue);

    let api_state = web::Data::new(ApiState {
        thumbs: stores.thumbs,
        repository,
    });
    let bind_address = config.app.bind_address();
    let server = HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::Logger::default())
            .app_data(api_state.clone())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind HTTP server to {bind_address}"))?
    .disable_signals()
    .run();
    let server_handle = server.handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let subscriber_task = tokio::spawn(async move { subscriber.run(deliveries, shutdown_rx).await });
    let server_task = tokio::spawn(async move {
        info!(address = %bind_address, "HTTP server is running");
        server.await
    });

    let outcome = supervise(shutdown_signal(), &shutdown_tx, subscriber_task, server_task).await;

    server_handle.stop(true).await;
    info!("HTTP server stopped");
    Ok(outcome)
}
