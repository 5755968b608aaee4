//! Offline job that fills in the precomputed destination embedding table.

use crate::{
    error::Result,
    ml::EmbeddingClient,
    services::{DestinationStore, EmbeddingTable},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub total: usize,
    pub skipped: usize,
    pub generated: usize,
    pub failed: usize,
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    bar
}

/// Embed every destination missing from `table`, one at a time, then write
/// the whole table to `output`.
///
/// A destination that fails is logged and left for the next run. The
/// `delay` follows every remote attempt except the one for the last item.
pub async fn build_embeddings(
    client: &EmbeddingClient,
    destinations: &DestinationStore,
    table: &EmbeddingTable,
    output: &Path,
    delay: Duration,
    progress: &ProgressBar,
) -> Result<BuildReport> {
    let mut report = BuildReport {
        total: destinations.len(),
        ..Default::default()
    };

    info!(
        "Generating embeddings for {} destinations ({} already present)",
        report.total,
        table.len()
    );

    for (index, destination) in destinations.all().iter().enumerate() {
        progress.set_message(format!("{}, {}", destination.city, destination.country));

        if table.contains(&destination.id) {
            info!(
                "Embedding already exists for {}, skipping",
                destination.city
            );
            report.skipped += 1;
            progress.inc(1);
            continue;
        }

        match client.embed(&destination.embedding_text()).await {
            Ok(embedding) => {
                table.insert(&destination.id, embedding);
                report.generated += 1;
                info!("Added embedding for {}", destination.city);
            }
            Err(e) => {
                report.failed += 1;
                error!("Error processing {}: {}", destination.city, e);
            }
        }
        progress.inc(1);

        if index + 1 < report.total && !delay.is_zero() {
            sleep(delay).await;
        }
    }

    progress.finish_with_message("done");
    table.save(output)?;

    info!(
        "Embedding build finished: {} total, {} generated, {} skipped, {} failed",
        report.total, report.generated, report.skipped, report.failed
    );
    if report.failed > 0 {
        warn!(
            "{} destinations have no embedding yet. Re-run to retry them.",
            report.failed
        );
    }

    Ok(report)
}
