//! Stream a gradient image to a display driver server
//!
//! ```bash
//! cargo run --example send_image -- --port 1559 --size 256 --handle gradient
//! ```

use clap::Parser;
use displaywire::DEFAULT_PORT;
use displaywire::data::{Box2i, CompoundMap, Data};
use displaywire::driver::{ClientDisplayDriver, DisplayDriver, HANDLE_PARAMETER};
use displaywire::protocol::OpenParameters;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "send_image")]
#[command(about = "Send an RGB gradient over the display driver protocol")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Width and height in pixels
    #[arg(short, long, default_value_t = 64)]
    size: i32,

    /// Image name on the server
    #[arg(long, default_value = "gradient")]
    handle: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let window = Box2i::from_coords(0, 0, args.size - 1, args.size - 1);
    let mut parameters = CompoundMap::new();
    parameters.insert(HANDLE_PARAMETER.to_string(), Data::from(args.handle.clone()));
    let open = OpenParameters {
        display_window: window,
        data_window: window,
        channel_names: vec!["R".into(), "G".into(), "B".into()],
        parameters,
    };

    let mut driver = ClientDisplayDriver::connect((args.host.as_str(), args.port), &open)?;
    info!(
        scan_line_order_only = driver.scan_line_order_only(),
        "image opened"
    );

    let scale = (args.size - 1).max(1) as f32;
    for y in 0..args.size {
        let line: Vec<f32> = (0..args.size)
            .flat_map(|x| [x as f32 / scale, y as f32 / scale, 0.25])
            .collect();
        driver.image_data(&Box2i::from_coords(0, y, args.size - 1, y), &line)?;
    }
    driver.image_close()?;

    info!(handle = %args.handle, size = args.size, "image sent");
    Ok(())
}
