use std::path::Path;
use std::sync::Arc;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use menu_responder::bot::Bot;
use menu_responder::channels::{Channel, CliChannel, WhatsAppChannel, WhatsAppConfig};
use menu_responder::config::{BotConfig, ChannelKind};
use menu_responder::pipeline::dispatcher::Dispatcher;
use menu_responder::server::{ServerState, health_routes};
use menu_responder::store::{ContactLog, JsonFileStore};

/// Log to stderr, plus a daily-rolling file when `log_dir` is set.
///
/// The returned guard flushes the file writer on drop; keep it alive.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "menu-responder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let menu = Arc::new(config.load_menu()?);

    eprintln!("📱 Menu Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Bot: {}", config.name);
    eprintln!("   Channel: {}", config.channel);
    eprintln!(
        "   Menu: v{} ({} options, {} keywords)",
        menu.version,
        menu.options.len(),
        menu.greeting_keywords.len()
    );
    eprintln!("   Contacts: {}", config.data_file.display());
    eprintln!("   HTTP: http://0.0.0.0:{}/", config.http_port);

    // ── Store ────────────────────────────────────────────────────────────
    let store = Arc::new(JsonFileStore::new(&config.data_file));
    let contacts = Arc::new(ContactLog::new(store));

    // ── Channel ──────────────────────────────────────────────────────────
    let (channel, webhook_router): (Arc<dyn Channel>, Option<axum::Router>) = match config.channel {
        ChannelKind::WhatsApp => {
            let wa_config = WhatsAppConfig::from_env()?;
            eprintln!("   Bridge: {}", wa_config.bridge_url);
            let whatsapp = WhatsAppChannel::new(wa_config)?;
            if let Err(e) = whatsapp.health_check().await {
                tracing::warn!(error = %e, "WhatsApp bridge not ready yet, waiting for webhooks anyway");
            }
            let router = whatsapp.router();
            (Arc::new(whatsapp) as Arc<dyn Channel>, Some(router))
        }
        ChannelKind::Cli => {
            eprintln!("   Type a message and press Enter. Prefix with 'group:' to simulate a group.\n");
            (Arc::new(CliChannel::from_env()) as Arc<dyn Channel>, None)
        }
    };

    // ── HTTP ─────────────────────────────────────────────────────────────
    let mut app = health_routes(ServerState {
        bot_name: config.name.clone(),
        channel: channel.name().to_string(),
        contacts: Arc::clone(&contacts),
    });
    if let Some(router) = webhook_router {
        app = app.merge(router);
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });
    tracing::info!(port = config.http_port, "HTTP server started");

    // ── Bot ──────────────────────────────────────────────────────────────
    let dispatcher = Arc::new(
        Dispatcher::new(Arc::clone(&channel), contacts, menu)?.with_typing_delay(config.typing_delay),
    );
    let bot = Bot::new(Arc::clone(&channel), dispatcher);

    tokio::select! {
        result = bot.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    if let Err(e) = channel.shutdown().await {
        tracing::warn!(error = %e, "Channel shutdown failed");
    }

    Ok(())
}
