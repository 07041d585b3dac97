// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn size_zero_or_one_falls_back_to_cpu_count() {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    assert_eq!(normalize_size(0), cpus);
    assert_eq!(normalize_size(1), cpus);
}

#[tokio::test]
async fn size_above_cpu_count_is_capped() {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    assert_eq!(normalize_size(cpus + 1000), cpus);
}

#[tokio::test]
async fn all_submitted_tasks_run_and_wait_blocks_until_done() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(4);
    for _ in 0..10 {
        let counter = counter.clone();
        pool.submit(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    }
    pool.wait(true).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn failing_tasks_are_aggregated_without_stopping_others() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(4);
    for i in 0..5 {
        let counter = counter.clone();
        pool.submit(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if i % 2 == 0 {
                Err(format!("task {i} failed").into())
            } else {
                Ok(())
            }
        })
        .await;
    }
    let err = pool.wait(true).await.unwrap_err();
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert_eq!(err.0.len(), 3);
}

#[tokio::test]
async fn clear_false_preserves_errors_across_calls() {
    let mut pool = WorkerPool::new(2);
    pool.submit(|| async { Err("boom".into()) }).await;
    let first = pool.wait(false).await.unwrap_err();
    let second = pool.wait(false).await.unwrap_err();
    assert_eq!(first.0, second.0);
}
