use std::net::TcpListener;
use std::sync::Arc;

use account_service::configuration::{
    get_configuration, DirectoryBackend, MediaBackend, Settings,
};
use account_service::directory::{
    IdentityDirectory, InMemoryIdentityDirectory, PgIdentityDirectory,
};
use account_service::media::{LocalMediaStore, MediaStore, RemoteMediaStore};
use account_service::startup::run;
use account_service::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let directory = build_directory(&configuration).await?;
    let media = build_media_store(&configuration);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, directory, media, &configuration)?;
    tracing::info!("Server started successfully");

    server.await
}

async fn build_directory(
    configuration: &Settings,
) -> std::io::Result<Arc<dyn IdentityDirectory>> {
    match configuration.directory.backend {
        DirectoryBackend::Memory => {
            tracing::warn!("Using the in-memory identity directory; accounts are not persisted");
            Ok(Arc::new(InMemoryIdentityDirectory::new()))
        }
        DirectoryBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(configuration.database.max_connections)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
                })?;

            tracing::info!("Database connection pool created successfully");
            Ok(Arc::new(PgIdentityDirectory::new(pool)))
        }
    }
}

fn build_media_store(configuration: &Settings) -> Arc<dyn MediaStore> {
    let media = &configuration.media;
    match media.backend {
        MediaBackend::Local => {
            tracing::info!(root = %media.local_root, "Storing media on local disk");
            Arc::new(LocalMediaStore::new(&media.local_root, &media.public_path))
        }
        MediaBackend::Remote => {
            tracing::info!(base_url = %media.remote_base_url, "Storing media remotely");
            Arc::new(RemoteMediaStore::new(
                media.remote_base_url.clone(),
                media.api_key.clone(),
                media.timeout(),
            ))
        }
    }
}
