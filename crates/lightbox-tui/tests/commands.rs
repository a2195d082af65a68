use std::path::PathBuf;
use std::sync::Arc;

use lightbox_client::{QueueConfig, RemoteCache, UploadMode};
use lightbox_core::MediaKind;
use lightbox_service::LocalService;
use lightbox_tui::commands;

fn cache() -> Arc<RemoteCache> {
    let cache = Arc::new(RemoteCache::new(Arc::new(LocalService::new())));
    cache.mark_ready();
    cache
}

fn write_files(dir: &tempfile::TempDir, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect()
}

async fn listing(cache: &RemoteCache) -> String {
    let mut out = Vec::new();
    commands::list(&mut out, cache).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn upload_images_then_list() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &["a.png", "notes.txt", "b.jpg"]);
    let cache = cache();

    let mut out = Vec::new();
    let notice = commands::upload(
        &mut out,
        cache.clone(),
        MediaKind::Image,
        &paths,
        QueueConfig::default(),
    )
    .await
    .unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert!(!notice.is_error());
    assert_eq!(notice.message, "2 images uploaded successfully.");
    assert!(printed.contains("ignored 1 file(s) that are not images"));
    assert!(printed.contains("uploading 2 images (per-item)"));
    assert!(printed.contains("total 100.0%"));

    let list = listing(&cache).await;
    assert!(list.contains("Images (2):"));
    assert!(list.contains("a.png"));
    assert!(list.contains("b.jpg"));
    assert!(!list.contains("notes.txt"));
}

#[tokio::test]
async fn atomic_upload_replaces_collection() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_files(&dir, &["old.png"]);
    let second = write_files(&dir, &["x.png", "y.png"]);
    let cache = cache();

    let mut out = Vec::new();
    commands::upload(&mut out, cache.clone(), MediaKind::Image, &first, QueueConfig::default())
        .await
        .unwrap();

    let atomic = QueueConfig {
        mode: UploadMode::Atomic,
        ..QueueConfig::default()
    };
    let notice = commands::upload(&mut out, cache.clone(), MediaKind::Image, &second, atomic)
        .await
        .unwrap();
    assert_eq!(notice.message, "2 images uploaded successfully.");

    let list = listing(&cache).await;
    assert!(list.contains("Images (2):"));
    assert!(!list.contains("old.png"));
}

#[tokio::test]
async fn upload_document_and_clear_it() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &["guide.pdf"]);
    let cache = cache();

    let mut out = Vec::new();
    let notice = commands::upload(
        &mut out,
        cache.clone(),
        MediaKind::Document,
        &paths,
        QueueConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(notice.message, "PDF uploaded successfully.");
    assert!(listing(&cache).await.contains("guide.pdf"));

    let notice = commands::clear(&cache, true).await;
    assert_eq!(notice.message, "PDF removed.");
    assert!(!listing(&cache).await.contains("guide.pdf"));
}

#[tokio::test]
async fn nothing_to_upload_is_an_error_notice() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = write_files(&dir, &["readme.md"]);
    paths.push(dir.path().join("missing.png"));

    let mut out = Vec::new();
    let notice = commands::upload(&mut out, cache(), MediaKind::Image, &paths, QueueConfig::default())
        .await
        .unwrap();
    assert!(notice.is_error());
    assert_eq!(notice.message, "No images to upload.");
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("skipping unreadable file"));
}

#[tokio::test]
async fn remove_reports_missing_index() {
    let cache = cache();
    let notice = commands::remove(&cache, 3).await;
    assert!(notice.is_error());
    assert!(notice.message.starts_with("Failed to remove image: not found"));

    let notice = commands::clear(&cache, false).await;
    assert_eq!(notice.message, "All images removed.");
}
