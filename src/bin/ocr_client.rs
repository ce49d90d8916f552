use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use image_ocr_server::client::{EncodedImage, OcrServerClient, TransportEncoding};
use image_ocr_server::core::models::ImageReference;
use image_ocr_server::presentation::response_envelope::UploadResponse;

#[derive(Parser)]
#[command(name = "ocr-client")]
#[command(about = "Send images to an image-ocr-server and print the extracted text")]
#[command(version)]
struct Cli {
    /// Base URL of the OCR server
    #[arg(long, env = "OCR_SERVER_URL", default_value = "http://localhost:5000")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_seconds: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image and print its text
    Recognize {
        image: PathBuf,

        /// multipart or base64
        #[arg(long, default_value = "multipart")]
        encoding: TransportEncoding,
    },
    /// Upload an image and print the stored file path
    Upload {
        image: PathBuf,

        #[arg(long, default_value = "base64")]
        encoding: TransportEncoding,
    },
    /// Extract text from a previously uploaded file path
    Extract { file_path: String },
    /// Show the server's health report
    Health,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = OcrServerClient::new(&cli.server, Duration::from_secs(cli.timeout_seconds))?;

    match cli.command {
        Commands::Recognize { image, encoding } => {
            let image = EncodedImage::read_file(&image).await?;
            log::info!("[CLIENT] Sending {} bytes via {}", image.bytes().len(), encoding);
            let response = client.recognize(&image, encoding).await?;
            if response.no_text_detected {
                eprintln!("No text detected");
            } else {
                println!("{}", response.text);
            }
        }
        Commands::Upload { image, encoding } => {
            let image = EncodedImage::read_file(&image).await?;
            let reference = match encoding {
                TransportEncoding::Base64 => client.upload_base64(&image).await?,
                TransportEncoding::Multipart => match client.upload(&image).await? {
                    UploadResponse::Stored(stored) => stored.file_path,
                    UploadResponse::Text(text) => {
                        println!("{}", text.text);
                        return Ok(());
                    }
                },
            };
            println!("{}", reference);
        }
        Commands::Extract { file_path } => {
            let reference = ImageReference::parse_client_supplied(Some(&file_path))
                .context("A file path is required")?;
            let response = client.extract_text(&reference).await?;
            if response.no_text_detected {
                eprintln!("No text detected");
            } else {
                println!("{}", response.text);
            }
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
