use config::{BoardSettings, ConfigError, Env};
use guildboard_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{DbError, Store},
};
use mail::{LogMailer, MailError, Mailer, SmtpMailer, SmtpSettings};
use media::MediaStore;
use server::{ServerState, notify::Notifier};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod mail;
mod media;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error setting up the mailer: {0}")]
    Mail(#[from] MailError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "guildboard_api=debug,\
                guildboard_db=debug,\
                guildboard_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn build_store(env: &Env) -> Result<Arc<dyn Store>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping everything in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let client = DbClient::connect(database_url).await?;
    client.migrate().await?;
    info!("Database connected and migrated");

    Ok(Arc::new(client))
}

fn build_mailer(env: &Env) -> Result<Arc<dyn Mailer>, InitError> {
    let Some(host) = &env.smtp_host else {
        warn!("SMTP_HOST is not set, emails will only be logged");
        return Ok(Arc::new(LogMailer::new(env.mail_from.clone())));
    };

    let settings = SmtpSettings {
        host: host.clone(),
        port: env.smtp_port,
        username: env.smtp_username.clone(),
        password: env.smtp_password.clone(),
    };

    Ok(Arc::new(SmtpMailer::new(&settings, &env.mail_from)?))
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }

    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = config::load_env()?;
    let settings = BoardSettings::from_env(&env)?;
    info!(media_dir = %settings.media_dir.display(), "Storing uploads");

    let state = ServerState {
        store: build_store(&env).await?,
        notifier: Arc::new(Notifier::new(
            build_mailer(&env)?,
            settings.public_url.clone(),
        )),
        media: Arc::new(MediaStore::new(settings.media_dir.clone())),
        settings: Arc::new(settings),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    info!("Shut down");

    Ok(())
}
