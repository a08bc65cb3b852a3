// Biblioteca do bot de upsell Yampi
// Expõe módulos para uso em testes e no binário

pub mod config;
pub mod handlers;
pub mod services;
pub mod utils;

use std::sync::Arc;

use ia_service::PhoneOracle;

// AppState é definido aqui para ser compartilhado
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub resolver: Arc<services::PhoneResolver>,
    pub dispatcher: services::Dispatcher,
    /// Oráculo de IA (só quando configurado)
    pub oracle: Option<Arc<dyn PhoneOracle>>,
    pub ready_clock: services::ReadyClock,
}
