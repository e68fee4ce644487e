//! This example demonstrates the full video workflow:
//! 1. Encoding a seed image from the command line.
//! 2. Submitting an image-to-video job and polling it until it completes.
//! 3. Downloading the resulting video to a temporary directory.
//!
//! Press Ctrl-C while the job runs to cancel it.
//!
//! To run this example, you must have the `GEMINI_API_KEY` environment variable set.
//!
//! Usage:
//! `cargo run --example generate_video <IMAGE_PATH> [PROMPT] [16:9|9:16]`

use std::env;
use std::sync::Arc;
use veo_lro::{
    encode_for_upload, ArtifactStore, AspectRatio, EnvCredentialHost, GenAiClient, ImageFile,
    JobStatus, VideoConfig, VideoController, VideoInput,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let image_path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Please provide a seed image path as the first argument."))?;
    let prompt = args
        .next()
        .unwrap_or_else(|| "An epic, cinematic shot of this object falling through the clouds.".to_string());
    let aspect_ratio: AspectRatio = match args.next() {
        Some(value) => value.parse().map_err(anyhow::Error::msg)?,
        None => AspectRatio::Landscape,
    };

    let config = VideoConfig::from_env()?;
    let client = GenAiClient::new(None, &config)?;
    let store = ArtifactStore::temporary()?;
    let controller = Arc::new(VideoController::new(
        client,
        Some(Arc::new(EnvCredentialHost)),
        store,
        &config,
    ));

    let seed_image = encode_for_upload(&ImageFile::open(&image_path).await?)?;
    let input = VideoInput::new(prompt, seed_image, aspect_ratio);

    // Print every progress message as the controller publishes it.
    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        let mut last = None;
        while updates.changed().await.is_ok() {
            let message = updates
                .borrow()
                .as_ref()
                .and_then(|job| job.progress_message().map(str::to_string));
            if message.is_some() && message != last {
                println!("{}", message.as_deref().unwrap_or_default());
                last = message;
            }
        }
    });

    let job = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.start_video_job(input).await })
    };
    let ctrl_c = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nCancelling...");
                controller.cancel();
            }
        })
    };

    let status = job.await??;
    ctrl_c.abort();

    let Some(job) = controller.job() else {
        return Ok(());
    };
    match status {
        JobStatus::Succeeded => {
            if let Some(artifact) = job.result_artifact() {
                println!("\nVideo downloaded to: {}", artifact.path.display());
                println!("Press Enter to delete it and exit.");
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
            }
        }
        JobStatus::AwaitingCredential => {
            println!("\nNo API key selected. Set GEMINI_API_KEY and try again.");
        }
        JobStatus::Failed => {
            if let Some(error) = job.last_error() {
                eprintln!("\n{error}");
            }
        }
        other => println!("\nJob finished with status: {other:?}"),
    }

    Ok(())
}
