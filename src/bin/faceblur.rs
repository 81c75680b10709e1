//! faceblur CLI tool
//!
//! Blurs faces in a still image, found by the detector or drawn by hand.

#[cfg(feature = "cli")]
use faceblur::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
