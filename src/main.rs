use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use slice_api::consts::{
    DEFAULT_BIND, DEFAULT_LAYER_HEIGHT, DEFAULT_SLICE_TIMEOUT, DEFAULT_SLICER, NAME, VERSION,
};
use slice_api::server::{ServerConfig, router};
use slice_api::slicer::Slicer;
use slice_api::slicer::prusa::{PrusaSlicer, SlicerConfig};

#[derive(Parser)]
#[command(
    name = "slice-api",
    version,
    about = "Slice uploaded STL/OBJ models and report print time and filament use."
)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Slicer executable (name on PATH or full path)
    #[arg(short, long, default_value = DEFAULT_SLICER)]
    slicer: PathBuf,

    /// Layer height passed to the slicer, in millimeters
    #[arg(long, default_value_t = DEFAULT_LAYER_HEIGHT)]
    layer_height: f64,

    /// Slicer timeout in seconds (0 waits forever)
    #[arg(short, long, default_value_t = DEFAULT_SLICE_TIMEOUT.as_secs())]
    timeout: u64,

    /// Reject uploads larger than this many bytes (default: no limit)
    #[arg(long)]
    max_upload_bytes: Option<usize>,

    /// Directory for staged uploads and slicer output (default: system temp)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `slice_api=debug,tower_http=debug`
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).context("invalid --log-level")?)
        .init();

    if let Some(dir) = &cli.work_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create work dir {}", dir.display()))?;
    }

    let slicer_config = SlicerConfig {
        binary: cli.slicer,
        layer_height: cli.layer_height,
        timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
    };
    let server_config = ServerConfig {
        work_dir: cli.work_dir,
        max_upload_bytes: cli.max_upload_bytes,
    };

    tracing::info!(
        version = VERSION,
        slicer = %slicer_config.binary.display(),
        layer_height = slicer_config.layer_height,
        timeout_secs = ?slicer_config.timeout.map(|t| t.as_secs()),
        max_upload_bytes = ?server_config.max_upload_bytes,
        "starting {}",
        NAME
    );

    let slicer: Arc<dyn Slicer> = Arc::new(PrusaSlicer::new(slicer_config));
    let app = router(slicer, server_config);

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("goodbye.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
