/// Bot de upsell Yampi
///
/// Fluxo:
/// - Webhook recebe o pedido confirmado e resolve o telefone do cliente
/// - Mensagem de oferta vai para a fila single-flight (um envio por vez)
/// - Gateway WPPConnect entrega texto ou imagem com legenda
///
/// O oráculo de IA (Gemini/OpenAI) só é consultado quando as estratégias
/// locais não acham telefone.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use mensageria::SendQueue;
use wpp::{Transport, WppConnectClient, WppConnectConfig};

use yampi_upsell_bot::config::Settings;
use yampi_upsell_bot::handlers::build_router;
use yampi_upsell_bot::services::{prepare_offer_media, spawn_ready_watch, Dispatcher, PhoneResolver, ReadyClock};
use yampi_upsell_bot::utils::{logging::*, AppError};
use yampi_upsell_bot::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Inicializar tracing (RUST_LOG, padrão info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Carregar configurações
    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    // Cliente do gateway WhatsApp
    let mut wpp_config = WppConnectConfig::new(&settings.whatsapp.base_url, &settings.whatsapp.session_name)
        .with_timeout_secs(settings.whatsapp.request_timeout_secs);
    if let Some(ref token) = settings.whatsapp.token {
        wpp_config = wpp_config.with_token(token);
    }
    let transport: Arc<dyn Transport> = Arc::new(
        WppConnectClient::new(wpp_config)
            .map_err(|e| AppError::ConfigError(format!("Failed to create WPPConnect client: {}", e)))?,
    );
    log_info(&format!(
        "📱 Gateway WPPConnect: {} (sessão '{}')",
        settings.whatsapp.base_url, settings.whatsapp.session_name
    ));

    // Imagem da oferta (baixada uma vez)
    let http = reqwest::Client::new();
    let media = prepare_offer_media(&http, &settings.offer).await;
    match media {
        Some(ref m) => log_info(&format!("🖼️ Oferta com imagem: {:?}", m)),
        None => log_info("ℹ️ Oferta sem imagem (somente texto)"),
    }

    // Oráculo de IA (opcional)
    let oracle = match settings.ia_config() {
        Some(config) => match ia_service::build_oracle(config) {
            Ok(oracle) => Some(oracle),
            Err(e) => {
                log_warning(&format!("⚠️ Falha ao inicializar oráculo de IA: {}. Fallback desabilitado.", e));
                None
            }
        },
        None => {
            log_info("ℹ️ Oráculo de IA desabilitado (sem GEMINI_API_KEY/OPENAI_API_KEY)");
            None
        }
    };

    let dispatcher = Dispatcher::new(SendQueue::new(), Arc::clone(&transport))
        .with_media(media)
        .with_jid_suffix(settings.whatsapp.jid_suffix.clone())
        .with_send_timeout(Duration::from_secs(settings.webhook.send_timeout_secs));

    // Sessão do WhatsApp: registra quando conectar
    let ready_clock = ReadyClock::new();
    spawn_ready_watch(
        transport,
        ready_clock.clone(),
        Duration::from_secs(settings.whatsapp.ready_poll_secs.max(1)),
    );

    let app_state = Arc::new(AppState {
        resolver: Arc::new(PhoneResolver::from_settings(&settings.phone)),
        settings: settings.clone(),
        dispatcher,
        oracle,
        ready_clock,
    });

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;

    log_server_startup(settings.server.port);
    log_server_ready(settings.server.port);

    // Graceful shutdown com signal handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("Failed to install Ctrl+C handler: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Failed to install SIGTERM handler: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
