use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lightbox_client::{Notice, QueueConfig, RemoteCache, UploadQueue};
use lightbox_core::{LocalFile, MediaKind, QueuedItem};
use tracing::warn;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Read `paths`, queue what `kind` accepts and submit it, printing item
/// progress while the transfer runs.
pub async fn upload<W: Write>(
    out: &mut W,
    cache: Arc<RemoteCache>,
    kind: MediaKind,
    paths: &[PathBuf],
    config: QueueConfig,
) -> Result<Notice> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match LocalFile::read(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(error = %e, "skipping file");
                writeln!(out, "skipping {e}")?;
            }
        }
    }

    let read = files.len();
    let queue = UploadQueue::new(kind, cache, config);
    let queued = queue.enqueue(files);
    let ignored = read.saturating_sub(queued);
    if ignored > 0 && kind == MediaKind::Image {
        writeln!(out, "ignored {ignored} file(s) that are not images")?;
    } else if ignored > 0 {
        writeln!(out, "ignored {ignored} file(s); only the last PDF is uploaded")?;
    }
    if queue.is_empty() {
        return Ok(Notice::error(format!("No {} to upload.", kind_noun(kind))));
    }

    writeln!(
        out,
        "uploading {} {} ({})",
        queue.len(),
        kind_noun(kind),
        queue.config().mode
    )?;

    let submit = queue.submit();
    tokio::pin!(submit);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut printed_version = None;
    let result = loop {
        tokio::select! {
            result = &mut submit => break result,
            _ = ticker.tick() => {
                let version = queue.version();
                if printed_version != Some(version) {
                    printed_version = Some(version);
                    print_progress(out, &queue.items(), queue.aggregate_progress())?;
                }
            }
        }
    };
    print_progress(out, &queue.items(), queue.aggregate_progress())?;

    Ok(match result {
        Ok(report) => Notice::from_report(kind, &report),
        Err(e) => Notice::from_upload_error(&e),
    })
}

fn kind_noun(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "images",
        MediaKind::Document => "PDF",
    }
}

fn print_progress<W: Write>(out: &mut W, items: &[QueuedItem], total: f64) -> Result<()> {
    for item in items {
        let note = item
            .last_error
            .as_deref()
            .map(|e| format!("  ({e})"))
            .unwrap_or_default();
        writeln!(
            out,
            "  {:<32} {:<10} {:>5.1}%{note}",
            item.name(),
            item.state.display_name(),
            item.progress
        )?;
    }
    writeln!(out, "  total {total:.1}%")?;
    Ok(())
}

pub async fn list<W: Write>(out: &mut W, cache: &RemoteCache) -> Result<()> {
    let images = cache
        .images()
        .await?
        .context("collaborator connection is not ready")?;
    writeln!(out, "Images ({}):", images.data.len())?;
    if images.data.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for (index, record) in images.data.iter().enumerate() {
        writeln!(
            out,
            "  {index:>3}  {:<32} {}",
            record.filename,
            record.uploaded_at.display_local()
        )?;
    }

    let document = cache
        .document()
        .await?
        .context("collaborator connection is not ready")?;
    writeln!(out, "Document:")?;
    match &*document.data {
        Some(record) => writeln!(
            out,
            "       {:<32} {}",
            record.filename,
            record.uploaded_at.display_local()
        )?,
        None => writeln!(out, "  (none)")?,
    }
    Ok(())
}

pub async fn remove(cache: &RemoteCache, index: u64) -> Notice {
    let result = cache.remove_image(index).await;
    Notice::from_result(&result, "Image removed.", "remove image")
}

pub async fn clear(cache: &RemoteCache, document: bool) -> Notice {
    if document {
        let result = cache.clear_document().await;
        Notice::from_result(&result, "PDF removed.", "remove PDF")
    } else {
        let result = cache.clear_images().await;
        Notice::from_result(&result, "All images removed.", "clear images")
    }
}
