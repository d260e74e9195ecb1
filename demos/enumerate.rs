//! List all connected Rift S headsets.

use rift_s::{HidApiTransport, SessionConfig, Transport};

fn main() {
    env_logger::init();

    let config = SessionConfig::from_env();
    let paths = HidApiTransport::new(&config).and_then(|t| t.enumerate());
    match paths {
        Ok(paths) => {
            println!("Found {} Rift S headset(s):", paths.len());
            for (i, path) in paths.iter().enumerate() {
                println!(
                    "  [{}] {}  VID={:04x} PID={:04x}",
                    i, path, config.vendor_id, config.product_id
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
