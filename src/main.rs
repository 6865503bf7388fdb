use std::sync::Arc;

use anyhow::Context;

use dental_intake::admin::AdminAuth;
use dental_intake::config::{ServiceConfig, ServiceMode};
use dental_intake::intake::{self, AppState, IntakeEngine};
use dental_intake::llm::{self, EchoReply, FallbackReply, FreeformReply, UnconfiguredReply};
use dental_intake::session::MemorySessionStore;
use dental_intake::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    eprintln!("🦷 Dental Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mode: {}", config.mode);
    eprintln!(
        "   Locale: {} (bilingual: {}, extended identity: {})",
        config.flow.default_locale, config.flow.bilingual, config.flow.extended_identity
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Intake engine ────────────────────────────────────────────────────
    let engine = Arc::new(IntakeEngine::new(
        Arc::new(MemorySessionStore::new()),
        Arc::clone(&db),
        config.flow,
    ));
    let _eviction_handle =
        intake::spawn_eviction_task(Arc::clone(&engine), config.sweep_interval, config.session_ttl);
    eprintln!(
        "   Sessions: in memory, idle TTL {}s",
        config.session_ttl.as_secs()
    );

    // ── Free-form replies ────────────────────────────────────────────────
    let generator: Arc<dyn FreeformReply> = match (config.mode, &config.llm) {
        (ServiceMode::Assistant, Some(llm_config)) => {
            llm::create_reply(llm_config, config.request_timeout)?
        }
        (ServiceMode::Assistant, None) => {
            tracing::warn!("Assistant mode without LLM_API_KEY; every reply will be the fallback");
            Arc::new(UnconfiguredReply)
        }
        _ => Arc::new(EchoReply),
    };

    // ── Admin ────────────────────────────────────────────────────────────
    let admin = match &config.admin {
        Some(admin_config) => Some(Arc::new(AdminAuth::new(admin_config)?)),
        None => {
            eprintln!("   Admin: disabled (set ADMIN_USERNAME and ADMIN_PASSWORD)");
            None
        }
    };

    let state = AppState {
        mode: config.mode,
        engine,
        freeform: Arc::new(FallbackReply::new(generator)),
        db,
        admin,
    };
    let app = intake::intake_routes(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat\n", config.port);
    tracing::info!(port = config.port, "Intake server started");

    axum::serve(listener, app).await?;
    Ok(())
}
