//! Display driver server collecting images in memory
//!
//! ```bash
//! cargo run --example image_server -- --port 1559
//! ```
//!
//! Pair with the `send_image` demo. Every closed image is reported with its
//! size and the mean of each channel.

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use displaywire::driver::{ClientDisplayDriver, DriverFactory, IMAGE_DRIVER_TYPE, ImageStore};
use displaywire::{DEFAULT_PORT, DisplayDriverServer, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "image_server")]
#[command(about = "Receive rendered images over the display driver protocol")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Driver used when a client names none
    #[arg(long, default_value = IMAGE_DRIVER_TYPE)]
    default_driver: String,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let store = ImageStore::new();
    let mut factory = DriverFactory::new();
    store.register_driver(&mut factory);
    ClientDisplayDriver::register(&mut factory);

    let config = ServerConfig {
        bind_address: args.bind,
        port: args.port,
        default_driver: Some(args.default_driver),
        ..ServerConfig::default()
    };
    let server = DisplayDriverServer::new(config, factory)?;
    info!(addr = %server.local_addr(), "waiting for images");

    let mut poll = tokio::time::interval(Duration::from_millis(250));
    let deadline = args.seconds.map(Duration::from_secs);
    let started = tokio::time::Instant::now();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                for handle in store.handles() {
                    if let Some(image) = store.take(&handle) {
                        report(&handle, &image);
                    }
                }
                if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                    break;
                }
            }
        }
    }

    drop(server);
    let stats = displaywire::protocol::metrics_snapshot();
    println!(
        "sessions: {}, messages: {}, errors: {}",
        stats.sessions_accepted,
        stats.received_messages(),
        stats.total_errors()
    );
    Ok(())
}

fn report(handle: &str, image: &displaywire::driver::Image) {
    let window = image.data_window();
    println!("image {handle:?}: data window {window:?}");
    for name in image.channel_names() {
        let Some(values) = image.channel(name) else {
            continue;
        };
        let mean = values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len().max(1) as f64;
        println!("  {name}: mean {mean:.4}");
    }
}
