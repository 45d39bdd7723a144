pub mod api_server;
pub mod app;
pub mod availability;
pub mod builder;
pub mod commit;
pub mod config;
pub mod contacts;
pub mod draft;
pub mod engine;
pub mod error;
pub mod extract;
pub mod intent;
pub mod matching;
pub mod services;
pub mod temporal;
pub mod utils;

use anyhow::Result;

pub async fn run() -> Result<()> {
    let app = app::Application::new();
    log::info!("Initializing Carenda application");
    app.run().await
}

pub fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

// Re-export commonly used types
pub use config::Config;
pub use draft::EventDraft;
pub use engine::{Engine, EngineServices};
pub use error::{EngineError, ServiceError};
pub use matching::{MatchStatus, ParticipantMatch};
