use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use video_upload_backend::{
    build_router,
    cleanup,
    config::Config,
    db::MemoryVideoStore,
    ffmpeg::{FfmpegRemuxer, FfprobeProber},
    models::AppState,
    storage::S3Gateway,
    system_info,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("video_upload_backend=debug,tower_http=debug")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;

    // Ensure scratch directory exists
    tokio::fs::create_dir_all(&config.scratch_dir).await?;

    let sys_info = system_info::get_system_info(&config).await;
    system_info::print_startup_info(&config, &sys_info);

    let objects = S3Gateway::new(&config.storage).await;

    // Create app state
    let app_state = Arc::new(AppState {
        videos: Arc::new(MemoryVideoStore::new()),
        objects: Arc::new(objects),
        prober: Arc::new(FfprobeProber::new(&config.media.ffprobe_path)),
        remuxer: Arc::new(FfmpegRemuxer::new(&config.media.ffmpeg_path)),
        config: config.clone(),
    });

    let _cleanup = cleanup::start_cleanup_task(config.scratch_dir.clone(), config.limits.clone());

    let app = build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
