use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskbell::api::router;
use taskbell::config::AppConfig;
use taskbell::db::{SqliteKvStore, TaskRepository};
use taskbell::notify::{
    DialogQueue, HttpGateway, NotificationSink, Notifier, SystemNotificationSink, ToastBoard,
};
use taskbell::services::ReminderScheduler;
use taskbell::state::AppState;
use taskbell::store::TaskStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "taskbell=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let kv = SqliteKvStore::connect(&config.database_url).await?;
    info!("using database {}", config.database_url);

    let toasts = Arc::new(ToastBoard::new(config.toast_ttl));
    let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![toasts.clone()];

    if let Some(url) = &config.notify_gateway_url {
        let system = SystemNotificationSink::new(Arc::new(HttpGateway::new(url.as_str())?));
        system.prime().await;
        sinks.push(Arc::new(system));
        info!("system notifications via {}", url);
    }

    let dialogs = if config.notify_dialogs {
        let dialogs = Arc::new(DialogQueue::new());
        sinks.push(dialogs.clone());
        Some(dialogs)
    } else {
        None
    };

    let notifier = Arc::new(Notifier::new(sinks));
    let store = Arc::new(
        TaskStore::open(
            TaskRepository::new(Arc::new(kv)),
            notifier.clone(),
            config.deadline_policy,
        )
        .await,
    );

    let shutdown = CancellationToken::new();
    let scheduler = ReminderScheduler::new(
        store.clone(),
        notifier.clone(),
        config.reminder_interval,
        config.reminder_threshold,
    )
    .with_cancellation(shutdown.child_token())
    .spawn();

    let state = AppState {
        store: store.clone(),
        notifier,
        toasts,
        dialogs,
    };
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            server_shutdown.cancel();
        })
        .await?;

    scheduler.stop().await;
    store.flush().await;
    info!("shutdown complete");

    Ok(())
}
