use image_ocr_server::app::OcrServerApp;
use image_ocr_server::global_constants;
use image_ocr_server::server_settings::ServerSettings;

#[tokio::main]
async fn main() {
    for env_file in [".env.local", ".env"] {
        match dotenvy::from_filename(env_file) {
            Ok(path) => {
                eprintln!("[STARTUP] Loaded {}", path.display());
                break;
            }
            Err(error) if error.not_found() => continue,
            Err(error) => eprintln!("[STARTUP] Failed to load {}: {}", env_file, error),
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("[MAIN] Starting {}", global_constants::APPLICATION_NAME);
    println!("{}", global_constants::STARTUP_BANNER);

    if let Err(error) = run().await {
        log::error!("[MAIN] {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = ServerSettings::load()?;
    let app = OcrServerApp::build(settings).await?;
    app.run().await
}
