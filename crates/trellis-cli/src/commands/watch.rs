//! `trellis watch` — incremental synchronization until interrupted.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;
use trellis_watch::{FsWatcher, SyncConfig, Synchronizer};

use crate::context::AppContext;

pub async fn run(ctx: &AppContext, path: &Path, semantic: bool) -> Result<()> {
    let pipeline = Arc::new(ctx.pipeline(path, true, semantic)?);
    let corpus = pipeline.corpus().to_string();

    let (tx, rx) = mpsc::unbounded_channel();
    let _watcher = FsWatcher::start(Path::new(&corpus), tx)?;

    let synchronizer = Synchronizer::new(pipeline, SyncConfig::default());
    let runner = {
        let synchronizer = synchronizer.clone();
        tokio::spawn(async move { synchronizer.run(rx).await })
    };

    println!("Watching {corpus} — press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("stopping watch");

    runner.abort();
    synchronizer.quiesce().await;
    Ok(())
}
