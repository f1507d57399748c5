//! Run a single eviction sweep over a download directory and print the result.
//!
//! Usage: cargo run --example sweep -- path/to/downloads [retention-secs]

use std::time::Duration;

use audiograb::{ArtifactStore, Janitor};

#[tokio::main]
async fn main() -> audiograb::Result<()> {
    let mut args = std::env::args().skip(1);
    let dir = args.next().expect("usage: sweep <download-dir> [retention-secs]");
    let retention = args
        .next()
        .map(|s| s.parse().expect("retention-secs must be an integer"))
        .unwrap_or(3600);

    let store = ArtifactStore::open(dir)?;
    let janitor = Janitor::new(
        store,
        Duration::from_secs(retention),
        Duration::from_secs(600),
    );

    let report = janitor.sweep().await;
    println!(
        "scanned {} entries, evicted {}, failed {}",
        report.scanned, report.evicted, report.failed
    );

    Ok(())
}
