//! Scheduler timing under paused tokio time

mod common;

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use whm_common::RetryPolicy;
use whm_importer::pipeline::{ScheduleMode, Scheduler, SchedulerSettings};
use whm_importer::storage::MemoryObjectStore;

use common::*;

fn settings(mode: ScheduleMode) -> SchedulerSettings {
    SchedulerSettings {
        mode,
        interval: Duration::from_secs(300),
        reinit_delay: Duration::from_secs(60),
    }
}

#[tokio::test(start_paused = true)]
async fn test_live_mode_sweeps_every_interval() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    objects
        .insert(live_key("20250506065250", "1", "S"), movement_xml(1, "2025-05-06T06:52:50", 1.0))
        .await;

    let harness = Harness::new(objects.clone()).await;
    let mut scheduler = Scheduler::new(Arc::new(harness.importer()), settings(ScheduleMode::Live));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(&cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(objects.keys().await.contains(&archive_key("1.xml")));

    objects
        .insert(live_key("20250506070000", "2", "S"), movement_xml(2, "2025-05-06T07:00:00", 2.0))
        .await;
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(!objects.keys().await.contains(&archive_key("2.xml")), "next sweep is not due yet");

    tokio::time::sleep(Duration::from_secs(101)).await;
    assert!(objects.keys().await.contains(&archive_key("2.xml")));

    cancel.cancel();
    task.await??;
    assert_eq!(harness.publisher.sent().len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_live_mode_backs_off_after_failures() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    objects
        .insert(live_key("20250506065250", "1", "S"), movement_xml(1, "2025-05-06T06:52:50", 1.0))
        .await;

    let lister = Arc::new(FlakyLister::new(objects.clone(), 2));
    let mut harness = Harness::new(objects.clone()).await.lister(lister.clone());
    harness.retry = RetryPolicy::no_retry();
    let mut scheduler = Scheduler::new(Arc::new(harness.importer()), settings(ScheduleMode::Live));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(&cancel).await }
    });

    // Failures at 0s and 3s, then a 6s backoff
    tokio::time::sleep(Duration::from_millis(8_500)).await;
    assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    assert!(harness.publisher.sent().is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    assert_eq!(harness.publisher.sent().len(), 1);

    cancel.cancel();
    task.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reinit_waits_then_retries_until_clean() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    let source = archive_key("045-M01-2025-C-1.xml");
    objects.insert(&source, movement_xml(1, "2025-05-06T06:52:50", 1.0)).await;

    let lister = Arc::new(FlakyLister::new(objects.clone(), 1));
    let mut harness = Harness::new(objects.clone()).await.reinit().lister(lister.clone());
    harness.retry = RetryPolicy::no_retry();
    let mut scheduler = Scheduler::new(Arc::new(harness.importer()), settings(ScheduleMode::Reinit));

    let started = Instant::now();
    scheduler.run(&CancellationToken::new()).await?;

    assert!(started.elapsed() >= Duration::from_secs(63), "reinit delay plus one backoff");
    assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.publisher.sent().len(), 1);
    assert!(objects.keys().await.contains(&source));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_reinit_delay() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    let harness = Harness::new(objects.clone()).await.reinit();
    let mut scheduler = Scheduler::new(Arc::new(harness.importer()), settings(ScheduleMode::Reinit));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(&cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();

    task.await??;
    assert!(harness.publisher.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_single_run_reports_sweep() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    objects
        .insert(live_key("20250506065250", "1", "S"), movement_xml(1, "2025-05-06T06:52:50", 1.0))
        .await;

    let harness = Harness::new(objects.clone()).await;
    let scheduler = Scheduler::new(Arc::new(harness.importer()), settings(ScheduleMode::Live));
    let report = scheduler.run_single(&CancellationToken::new()).await?;

    assert_eq!(report.listed, 1);
    assert_eq!(report.blocks, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flush_interval_emits_block_while_sweep_stalls() -> Result<()> {
    init_tracing();
    let objects = Arc::new(MemoryObjectStore::new());
    objects
        .insert(live_key("20250506065250", "1", "S"), movement_xml(1, "2025-05-06T06:52:50", 1.0))
        .await;
    objects
        .insert(live_key("20250506070000", "2", "S"), movement_xml(2, "2025-05-06T07:00:00", 2.0))
        .await;

    let loader = SlowLoader::new(objects.clone(), "_2_S", Duration::from_secs(60));
    let harness = Harness::new(objects.clone()).await.loader(Arc::new(loader));
    let importer = harness.importer();
    let task = tokio::spawn(async move { importer.run_once(true, &CancellationToken::new()).await });

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(!task.is_finished(), "second object is still loading");
    assert_eq!(harness.publisher.sent().len(), 1);
    assert_eq!(
        quantities(&harness.rows("mgt").await),
        vec![("045-M01-2025-C-1".to_string(), 1.0)]
    );
    assert!(objects.keys().await.contains(&archive_key("1.xml")));

    let report = task.await??;
    assert_eq!(report.blocks, 2);
    assert_eq!(harness.publisher.sent().len(), 2);
    Ok(())
}
