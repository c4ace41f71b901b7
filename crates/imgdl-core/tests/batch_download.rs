//! Integration tests: real curl transfers against a local image server, driven
//! by the scheduler, with cancellation and cleanup.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::image_server::{self, ServerOptions};
use imgdl_core::config::{BatchConfig, SourceConfig};
use imgdl_core::control::{CancelController, CancelReason, Phase};
use imgdl_core::progress::ProgressSink;
use imgdl_core::scheduler;
use imgdl_core::state::BatchState;
use imgdl_core::transfer::CurlFetcher;
use tempfile::tempdir;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(u32, u32)>>,
}

impl ProgressSink for Recorder {
    fn on_progress(&self, current: u32, total: u32) {
        self.calls.lock().unwrap().push((current, total));
    }
}

fn batch(save: &Path, total: u32, parallelism: usize, template: String) -> BatchConfig {
    BatchConfig::new(total, parallelism, save)
        .unwrap()
        .with_source(SourceConfig {
            url_template: template,
            timeout: Duration::from_secs(20),
        })
}

fn leftovers(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn downloads_every_image() {
    let server = image_server::start(ServerOptions::default());
    let root = tempdir().unwrap();
    let save = root.path().join("outputs");
    std::fs::create_dir(&save).unwrap();
    let cfg = batch(&save, 5, 2, server.template());
    let fetcher = Arc::new(CurlFetcher::new(cfg.source().clone()));
    let state = BatchState::shared();
    let sink = Arc::new(Recorder::default());

    let outcome = scheduler::run(&cfg, Arc::clone(&state), fetcher, sink.clone()).await;

    assert!(outcome.is_complete(5), "{outcome:?}");
    assert_eq!(state.downloaded(), 5);
    assert_eq!(server.requests(), 5);
    for i in 1..=5 {
        let content = std::fs::read(save.join(format!("{i}.png"))).unwrap();
        assert_eq!(content, image_server::image_bytes(i));
    }
    assert_eq!(leftovers(&save).len(), 5, "no .part files expected");
    assert_eq!(
        *sink.calls.lock().unwrap(),
        vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_image_is_skipped() {
    let server = image_server::start(ServerOptions {
        fail: vec![2],
        ..ServerOptions::default()
    });
    let root = tempdir().unwrap();
    let save = root.path().join("outputs");
    std::fs::create_dir(&save).unwrap();
    let cfg = batch(&save, 4, 2, server.template());
    let state = BatchState::shared();

    let outcome = scheduler::run(
        &cfg,
        Arc::clone(&state),
        Arc::new(CurlFetcher::new(cfg.source().clone())),
        Arc::new(Recorder::default()),
    )
    .await;

    assert_eq!(outcome.succeeded, 3);
    assert_eq!(outcome.failed, 1);
    assert_eq!(state.downloaded(), 3);
    assert_eq!(leftovers(&save), vec!["1.png", "3.png", "4.png"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_host_fails_every_unit_without_aborting() {
    let root = tempdir().unwrap();
    let save = root.path().join("outputs");
    std::fs::create_dir(&save).unwrap();
    // Port 1 on loopback: connection refused.
    let cfg = batch(&save, 3, 3, "http://127.0.0.1:1/img/{index}".to_string());
    let state = BatchState::shared();

    let outcome = scheduler::run(
        &cfg,
        Arc::clone(&state),
        Arc::new(CurlFetcher::new(cfg.source().clone())),
        Arc::new(Recorder::default()),
    )
    .await;

    assert_eq!(outcome.admitted, 3);
    assert_eq!(outcome.failed, 3);
    assert_eq!(state.downloaded(), 0);
    assert!(leftovers(&save).is_empty());
    assert!(save.exists(), "no cancellation, so no cleanup");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_mid_batch_removes_completed_images() {
    let server = image_server::start(ServerOptions {
        delay: Duration::from_millis(150),
        ..ServerOptions::default()
    });
    let root = tempdir().unwrap();
    let save = root.path().join("outputs");
    std::fs::create_dir(&save).unwrap();
    let cfg = batch(&save, 8, 2, server.template());
    let state = BatchState::shared();
    let controller = CancelController::shared(Arc::clone(&state));

    let canceller = {
        let state = Arc::clone(&state);
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            while state.downloaded() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            controller.trigger(CancelReason::Interrupt)
        })
    };

    let outcome = scheduler::run(
        &cfg,
        Arc::clone(&state),
        Arc::new(CurlFetcher::new(cfg.source().clone())),
        Arc::new(Recorder::default()),
    )
    .await;
    assert!(canceller.await.unwrap());

    assert!(outcome.cancelled);
    assert!(outcome.admitted < 8);
    // Quiesced: everything admitted has reported, and the count is final.
    assert_eq!(outcome.succeeded + outcome.failed, outcome.admitted);
    assert_eq!(state.downloaded(), outcome.succeeded);
    assert!(state.downloaded() >= 3);

    let report = controller.finish(&cfg).expect("cleanup runs after cancel");
    assert_eq!(report.removed, state.downloaded());
    assert!(report.is_clean());
    assert!(report.dir_removed);
    assert!(!save.exists());
    assert_eq!(controller.phase(), Phase::CleanedUp);
    assert!(controller.finish(&cfg).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_transfers_are_halted_after_grace() {
    let server = image_server::start(ServerOptions {
        delay: Duration::from_secs(60),
        ..ServerOptions::default()
    });
    let root = tempdir().unwrap();
    let save = root.path().join("outputs");
    std::fs::create_dir(&save).unwrap();
    let cfg = batch(&save, 4, 2, server.template())
        .with_quiesce_timeout(Duration::from_millis(100));
    let state = BatchState::shared();
    let controller = CancelController::shared(Arc::clone(&state));

    let canceller = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            controller.trigger(CancelReason::Terminate)
        })
    };

    let started = Instant::now();
    let outcome = scheduler::run(
        &cfg,
        Arc::clone(&state),
        Arc::new(CurlFetcher::new(cfg.source().clone())),
        Arc::new(Recorder::default()),
    )
    .await;
    assert!(canceller.await.unwrap());

    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(state.is_halted());
    assert_eq!(outcome.admitted, 2);
    assert_eq!(outcome.failed, 2);
    assert_eq!(state.downloaded(), 0);

    let report = controller.finish(&cfg).expect("cleanup runs after cancel");
    assert_eq!(report.removed, 0);
    assert!(report.dir_removed, "partial files must not be left behind");
}
