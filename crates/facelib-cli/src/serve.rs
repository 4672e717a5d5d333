//! Line-oriented query loop with hot library reloading.
//!
//! Reads one comma-separated query embedding per stdin line and answers with
//! one JSON object per stdout line. A background task watches the library
//! source and swaps in a rebuilt library when the source changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use facelib_core::builder::parse_embedding;
use facelib_core::{identify, IdentityLibrary, LibraryHandle, LibrarySource};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    let source = config.library.clone();
    let handle = LibraryHandle::new(load_or_empty(source.clone()).await?);

    if config.reload_interval_secs > 0 {
        let interval = Duration::from_secs(config.reload_interval_secs);
        tokio::spawn(watch_source(source, handle.clone(), interval));
    } else {
        tracing::info!("library reloading disabled");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(threshold = config.threshold, "serving queries on stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    break;
                };
                let library = handle.snapshot();
                if let Some(reply) = answer(&line, &library, config.threshold) {
                    let mut out = reply.to_string();
                    out.push('\n');
                    stdout.write_all(out.as_bytes()).await?;
                    stdout.flush().await?;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Build `source` on a blocking thread, falling back to an empty library.
pub async fn load_or_empty(source: LibrarySource) -> Result<IdentityLibrary> {
    let label = source.to_string();
    let built = tokio::task::spawn_blocking(move || source.build(None)).await?;
    Ok(match built {
        Ok((library, _report)) => library,
        Err(e) => {
            tracing::warn!(
                source = %label,
                error = %e,
                "library build failed, continuing with an empty library"
            );
            IdentityLibrary::new()
        }
    })
}

/// Poll the library source and rebuild when it changes.
async fn watch_source(source: LibrarySource, handle: LibraryHandle, interval: Duration) {
    let mut last_seen = source_stamp(source.clone()).await;
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        reload_if_changed(&source, &handle, &mut last_seen).await;
    }
}

/// One polling step: rebuild `source` if its stamp moved since `last_seen`.
///
/// Returns whether a new library was swapped in. A failed rebuild keeps the
/// current library, and the new stamp is remembered so the same broken state
/// is not rebuilt on every tick.
async fn reload_if_changed(
    source: &LibrarySource,
    handle: &LibraryHandle,
    last_seen: &mut Option<SystemTime>,
) -> bool {
    let current = source_stamp(source.clone()).await;
    if current == *last_seen {
        return false;
    }
    *last_seen = current;

    tracing::info!(source = %source, "library source changed, rebuilding");
    let job = source.clone();
    match tokio::task::spawn_blocking(move || job.build(None)).await {
        Ok(Ok((library, report))) => {
            handle.replace(library);
            tracing::debug!(%report, "reload complete");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "rebuild failed, keeping current library");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "rebuild task panicked, keeping current library");
            false
        }
    }
}

async fn source_stamp(source: LibrarySource) -> Option<SystemTime> {
    tokio::task::spawn_blocking(move || newest_mtime(&source))
        .await
        .ok()
        .flatten()
}

/// Newest modification time under the source.
///
/// CSV sources use the file itself. Directory sources also look one and two
/// levels down, so images added to or rewritten in an identity folder count.
fn newest_mtime(source: &LibrarySource) -> Option<SystemTime> {
    let root = source.path();
    let mut newest = fs::metadata(root).and_then(|m| m.modified()).ok()?;
    if let LibrarySource::Directory { .. } = source {
        for dir in read_dir_paths(root) {
            for path in std::iter::once(dir.clone()).chain(read_dir_paths(&dir)) {
                if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
                    newest = newest.max(modified);
                }
            }
        }
    }
    Some(newest)
}

fn read_dir_paths(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

/// JSON reply for one query line; `None` for blank lines.
fn answer(line: &str, library: &IdentityLibrary, threshold: f32) -> Option<serde_json::Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let query = match parse_embedding(line) {
        Ok(query) => query,
        Err(e) => return Some(json!({ "error": e.to_string() })),
    };

    Some(match identify(&query, library, threshold) {
        Ok(result) => json!(result),
        Err(e) => json!({ "error": e.to_string() }),
    })
}
