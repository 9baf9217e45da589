use argh::FromArgs;
use infernum_caption::{
    CaptionConfig, CaptionEngine, Device, DominantColorModel, FixedCaptionModel, server,
};
use std::sync::Arc;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

#[derive(FromArgs)]
/// Infernum Caption serves image captions over HTTP.
struct CaptionArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// compute device ("cpu", "cuda" or "cuda:N"), detected when omitted
    #[argh(option, short = 'd')]
    device: Option<Device>,

    /// largest accepted upload, in bytes
    #[argh(option)]
    max_upload_bytes: Option<usize>,

    /// answer every upload with this caption instead of running a model
    #[argh(option)]
    fixed_caption: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: CaptionArgs = argh::from_env();

    let mut config = CaptionConfig::default();
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(max_upload_bytes) = args.max_upload_bytes {
        config.max_upload_bytes = max_upload_bytes;
    }
    log::info!("Using device {}", config.device);

    let engine = match args.fixed_caption {
        Some(caption) => CaptionEngine::new(FixedCaptionModel::new(caption)),
        None => CaptionEngine::new(DominantColorModel::new(&config)),
    };
    let app = server::router(Arc::new(engine), &config);

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::serve(listener, app).await?;

    Ok(())
}
