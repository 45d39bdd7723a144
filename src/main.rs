use anyhow::Result;
use env_logger::Env;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with custom format
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use chrono::Local;
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    // Service credentials come from .env in development
    dotenvy::dotenv().ok();

    info!("Starting Carenda");

    let app = carenda::app::Application::new();
    if std::env::args().any(|arg| arg == "--serve") {
        app.run_server_only().await
    } else {
        app.run().await
    }
}
