//! End-to-end tests for the cover pipeline.
//!
//! These run the real extract → transform → encode → write → sweep path
//! against temp directories, with an in-memory [`CoverSource`] standing in
//! for the HTTP endpoint so fetches can be counted.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookshelf::encode::{
    CoverEncoder, CoverFormat, FallbackEncoder, JpegEncoder, WebpEncoder,
};
use bookshelf::error::{EncodeError, RecordError};
use bookshelf::extract::parse_since;
use bookshelf::fetch::CoverSource;
use bookshelf::ingest::{run_pipeline, CoverOptions, RunSummary};
use bookshelf::progress::{NoProgress, ProgressEvent, ProgressReporter};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

// ─── Test doubles ───────────────────────────────────────────────────

/// Serves fixed payloads per identifier and counts every fetch.
#[derive(Default)]
struct MemorySource {
    payloads: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemorySource {
    fn with(mut self, identifier: &str, bytes: Vec<u8>) -> Self {
        self.payloads.insert(identifier.to_string(), bytes);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoverSource for MemorySource {
    fn describe(&self, identifier: &str) -> String {
        format!("memory://{}", identifier)
    }

    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, RecordError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .get(identifier)
            .cloned()
            .ok_or_else(|| RecordError::Status(404))
    }
}

/// An AVIF encoder that always fails, as on a build without AVIF support.
struct FailingAvif;

impl CoverEncoder for FailingAvif {
    fn format(&self) -> CoverFormat {
        CoverFormat::Avif
    }

    fn encode(&self, _image: &DynamicImage, _quality: u8) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::Unavailable("avif"))
    }
}

/// A JPEG encoder that always fails, e.g. on an oversized image.
struct FailingJpeg;

impl CoverEncoder for FailingJpeg {
    fn format(&self) -> CoverFormat {
        CoverFormat::Jpeg
    }

    fn encode(&self, _image: &DynamicImage, _quality: u8) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::Failed {
            format: "jpeg",
            message: "image too large".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

const HEADER: &str = "Book Id,Title,Author,Author l-f,ISBN,ISBN13,My Rating,Average Rating,Date Read";

/// A detailed JPEG, so the payload is well above placeholder size.
fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x % 251) as u8,
            (y % 241) as u8,
            ((x.wrapping_mul(31) ^ y.wrapping_mul(17)) % 256) as u8,
        ])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// A noisy PNG with a transparent gradient, in 8- or 16-bit RGBA.
fn rgba_png(width: u32, height: u32, sixteen_bit: bool) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x.wrapping_mul(7) % 256) as u8,
            (y.wrapping_mul(13) % 256) as u8,
            ((x ^ y) % 256) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    let img = if sixteen_bit {
        DynamicImage::ImageRgba16(DynamicImage::ImageRgba8(img).to_rgba16())
    } else {
        DynamicImage::ImageRgba8(img)
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// One export row; `isbn` is wrapped the way Goodreads escapes it.
fn row(title: &str, isbn: &str, date_read: &str) -> String {
    format!(
        "1,{},Some Author,\"Author, Some\",\"=\"\"{}\"\"\",\"=\"\"\"\"\",4,3.95,{}",
        title, isbn, date_read
    )
}

struct Env {
    _tmp: TempDir,
    csv: PathBuf,
    out_dir: PathBuf,
}

fn setup(rows: &[String]) -> Env {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("goodreads_library_export.csv");
    let mut body = String::from(HEADER);
    for r in rows {
        body.push('\n');
        body.push_str(r);
    }
    body.push('\n');
    std::fs::write(&csv, body).unwrap();
    let out_dir = tmp.path().join("covers");
    Env {
        _tmp: tmp,
        csv,
        out_dir,
    }
}

fn options(env: &Env) -> CoverOptions {
    CoverOptions {
        csv: env.csv.clone(),
        since: parse_since("2023-01-01").unwrap(),
        out_dir: env.out_dir.clone(),
        min_size: 1000,
        limit: None,
        overwrite: false,
        dry_run: false,
        format: CoverFormat::Webp,
        quality: 80,
        max_width: 1200,
    }
}

fn webp() -> Arc<FallbackEncoder> {
    Arc::new(FallbackEncoder::new(Box::new(WebpEncoder)))
}

async fn run(opts: &CoverOptions, source: &MemorySource, encoder: Arc<FallbackEncoder>) -> RunSummary {
    run_pipeline(opts, source, encoder, &NoProgress).await.unwrap()
}

fn dimensions(path: &Path) -> (u32, u32) {
    let img = image::open(path).unwrap();
    (img.width(), img.height())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn writes_resized_webp_for_escaped_isbn() {
    let env = setup(&[row("The C Programming Language", "0131103628", "2023/06/01")]);
    let payload = jpeg(1500, 1000);
    assert!(payload.len() > 1000);
    let source = MemorySource::default().with("0131103628", payload);

    let summary = run(&options(&env), &source, webp()).await;

    let artifact = env.out_dir.join("0131103628-cover.webp");
    assert!(artifact.exists());
    assert_eq!(dimensions(&artifact), (1200, 800));
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.candidates, 1);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn narrow_cover_keeps_its_size() {
    let env = setup(&[row("Small", "111", "2023/06/01")]);
    let source = MemorySource::default().with("111", jpeg(400, 600));

    run(&options(&env), &source, webp()).await;

    assert_eq!(dimensions(&env.out_dir.join("111-cover.webp")), (400, 600));
}

#[tokio::test]
async fn second_run_makes_no_network_calls() {
    let env = setup(&[row("Book", "222", "2023/06/01")]);
    let source = MemorySource::default().with("222", jpeg(300, 450));
    let opts = options(&env);

    let first = run(&opts, &source, webp()).await;
    let second = run(&opts, &source, webp()).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(first.processed, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped_existing, 1);
    let files: Vec<_> = std::fs::read_dir(&env.out_dir).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn overwrite_refetches_existing_artifact() {
    let env = setup(&[row("Book", "333", "2023/06/01")]);
    let source = MemorySource::default().with("333", jpeg(300, 450));
    std::fs::create_dir_all(&env.out_dir).unwrap();
    let artifact = env.out_dir.join("333-cover.webp");
    std::fs::write(&artifact, vec![7u8; 5000]).unwrap();

    let mut opts = options(&env);
    opts.overwrite = true;
    let summary = run(&opts, &source, webp()).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(dimensions(&artifact), (300, 450));
}

#[tokio::test]
async fn placeholder_payload_is_skipped_quietly() {
    let env = setup(&[row("Missing cover", "444", "2023/06/01")]);
    let source = MemorySource::default().with("444", vec![0xFF; 807]);

    let summary = run(&options(&env), &source, webp()).await;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.too_small, 1);
    assert!(!env.out_dir.join("444-cover.webp").exists());
}

#[tokio::test]
async fn null_identifier_is_never_fetched() {
    let env = setup(&[row("No ISBN", "nan", "2023/06/01"), row("Blank", "", "2023/07/01")]);
    let source = MemorySource::default();

    let summary = run(&options(&env), &source, webp()).await;

    assert_eq!(source.calls(), 0);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.ineligible, 2);
}

#[tokio::test]
async fn avif_failure_writes_webp_and_counts_once() {
    let env = setup(&[row("Book", "555", "2023/06/01")]);
    let source = MemorySource::default().with("555", jpeg(300, 450));
    let mut opts = options(&env);
    opts.format = CoverFormat::Avif;
    let encoder = Arc::new(FallbackEncoder::new(Box::new(FailingAvif)));

    let summary = run(&opts, &source, encoder).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.fallbacks, 1);
    let artifact = env.out_dir.join("555-cover.webp");
    assert!(artifact.exists());
    assert!(!env.out_dir.join("555-cover.avif").exists());
    assert_eq!(
        image::guess_format(&std::fs::read(&artifact).unwrap()).unwrap(),
        ImageFormat::WebP
    );
}

#[tokio::test]
async fn avif_fallback_artifact_is_not_refetched() {
    let env = setup(&[row("Book", "556", "2023/06/01")]);
    let source = MemorySource::default().with("556", jpeg(300, 450));
    let mut opts = options(&env);
    opts.format = CoverFormat::Avif;

    let first = run(&opts, &source, Arc::new(FallbackEncoder::new(Box::new(FailingAvif)))).await;
    let second = run(&opts, &source, Arc::new(FallbackEncoder::new(Box::new(FailingAvif)))).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(first.processed, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped_existing, 1);
    assert!(env.out_dir.join("556-cover.webp").exists());
}

#[tokio::test]
async fn jpeg_encode_failure_skips_record_without_fallback() {
    let env = setup(&[row("Book", "667", "2023/06/01")]);
    let source = MemorySource::default().with("667", jpeg(300, 450));
    let mut opts = options(&env);
    opts.format = CoverFormat::Jpeg;
    let encoder = Arc::new(FallbackEncoder::new(Box::new(FailingJpeg)));

    let summary = run(&opts, &source, encoder).await;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.fallbacks, 0);
    assert_eq!(std::fs::read_dir(&env.out_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn transparent_png_payloads_are_flattened_and_written() {
    let env = setup(&[
        row("Alpha", "701", "2023/06/02"),
        row("Deep alpha", "702", "2023/06/01"),
    ]);
    let source = MemorySource::default()
        .with("701", rgba_png(200, 300, false))
        .with("702", rgba_png(200, 300, true));
    let mut opts = options(&env);
    opts.format = CoverFormat::Jpeg;
    let encoder = Arc::new(FallbackEncoder::new(Box::new(JpegEncoder)));

    let summary = run(&opts, &source, encoder).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.fallbacks, 0);
    for id in ["701", "702"] {
        let written = image::open(env.out_dir.join(format!("{}-cover.jpg", id))).unwrap();
        assert_eq!((written.width(), written.height()), (200, 300));
        assert!(!written.color().has_alpha());
    }

    let webp_env = setup(&[row("Alpha", "703", "2023/06/01")]);
    let webp_source = MemorySource::default().with("703", rgba_png(200, 300, false));
    let summary = run(&options(&webp_env), &webp_source, webp()).await;
    assert_eq!(summary.processed, 1);
    assert!(webp_env.out_dir.join("703-cover.webp").exists());
}

#[tokio::test]
async fn jpeg_output_uses_jpg_suffix() {
    let env = setup(&[row("Book", "666", "2023/06/01")]);
    let source = MemorySource::default().with("666", jpeg(300, 450));
    let mut opts = options(&env);
    opts.format = CoverFormat::Jpeg;
    let encoder = Arc::new(FallbackEncoder::new(Box::new(JpegEncoder)));

    let summary = run(&opts, &source, encoder).await;

    assert_eq!(summary.processed, 1);
    let artifact = env.out_dir.join("666-cover.jpg");
    assert_eq!(
        image::guess_format(&std::fs::read(&artifact).unwrap()).unwrap(),
        ImageFormat::Jpeg
    );
}

#[tokio::test]
async fn one_bad_record_does_not_stop_the_run() {
    let env = setup(&[
        row("Unknown to remote", "777", "2023/08/01"),
        row("Garbage payload", "888", "2023/07/01"),
        row("Fine", "999", "2023/06/01"),
    ]);
    let source = MemorySource::default()
        .with("888", vec![b'x'; 4096])
        .with("999", jpeg(300, 450));

    let summary = run(&options(&env), &source, webp()).await;

    assert_eq!(source.calls(), 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.processed, 1);
    assert!(env.out_dir.join("999-cover.webp").exists());
}

#[tokio::test]
async fn older_and_undated_rows_are_not_candidates() {
    let env = setup(&[
        row("Too old", "101", "2022/12/31"),
        row("Undated", "102", ""),
        row("Recent", "103", "2023/01/01"),
    ]);
    let source = MemorySource::default().with("103", jpeg(200, 300));

    let summary = run(&options(&env), &source, webp()).await;

    assert_eq!(summary.candidates, 1);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn limit_keeps_most_recent() {
    let env = setup(&[
        row("Older", "201", "2023/02/01"),
        row("Newest", "202", "2023/09/01"),
        row("Middle", "203", "2023/05/01"),
    ]);
    let source = MemorySource::default()
        .with("201", jpeg(200, 300))
        .with("202", jpeg(200, 300))
        .with("203", jpeg(200, 300));
    let mut opts = options(&env);
    opts.limit = Some(2);

    let summary = run(&opts, &source, webp()).await;

    assert_eq!(summary.processed, 2);
    assert!(env.out_dir.join("202-cover.webp").exists());
    assert!(env.out_dir.join("203-cover.webp").exists());
    assert!(!env.out_dir.join("201-cover.webp").exists());
}

#[tokio::test]
async fn missing_columns_abort_before_any_fetch() {
    let tmp = TempDir::new().unwrap();
    let csv = tmp.path().join("export.csv");
    std::fs::write(&csv, "Title,Author\nA,B\n").unwrap();
    let env = Env {
        csv,
        out_dir: tmp.path().join("covers"),
        _tmp: tmp,
    };
    let source = MemorySource::default();

    let result = run_pipeline(&options(&env), &source, webp(), &NoProgress).await;

    assert!(result.is_err());
    assert_eq!(source.calls(), 0);
    assert!(!env.out_dir.exists());
}

#[tokio::test]
async fn dry_run_has_no_side_effects() {
    let env = setup(&[row("Book", "303", "2023/06/01")]);
    let source = MemorySource::default().with("303", jpeg(200, 300));
    let mut opts = options(&env);
    opts.dry_run = true;

    let summary = run(&opts, &source, webp()).await;

    assert_eq!(source.calls(), 0);
    assert_eq!(summary.planned, 1);
    assert_eq!(summary.processed, 0);
    assert!(!env.out_dir.exists());
}

#[tokio::test]
async fn sweep_removes_leftover_placeholders_after_run() {
    let env = setup(&[row("Book", "404", "2023/06/01")]);
    std::fs::create_dir_all(&env.out_dir).unwrap();
    std::fs::write(env.out_dir.join("X-cover.webp"), vec![0u8; 500]).unwrap();
    std::fs::write(env.out_dir.join("Y-cover.webp"), vec![0u8; 2000]).unwrap();
    let source = MemorySource::default();

    let summary = run(&options(&env), &source, webp()).await;

    assert_eq!(summary.deleted, 1);
    assert!(!env.out_dir.join("X-cover.webp").exists());
    assert!(env.out_dir.join("Y-cover.webp").exists());
}

#[tokio::test]
async fn progress_is_reported_every_twenty_covers() {
    let rows: Vec<String> = (0..41)
        .map(|i| row(&format!("Book {}", i), &format!("9{:03}", i), "2023/06/01"))
        .collect();
    let env = setup(&rows);
    let payload = jpeg(64, 64);
    let mut source = MemorySource::default();
    for i in 0..41 {
        source = source.with(&format!("9{:03}", i), payload.clone());
    }
    let mut opts = options(&env);
    opts.min_size = 100;
    let progress = RecordingProgress::default();

    let summary = run_pipeline(&opts, &source, webp(), &progress)
        .await
        .unwrap();

    assert_eq!(summary.processed, 41);
    let events = progress.events.lock().unwrap();
    let processed: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Processed { n, .. } => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(processed, vec![20, 40]);
    assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 41 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Sweeping));
}
