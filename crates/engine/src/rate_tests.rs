// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::AsyncWriteExt;

#[test]
fn burst_is_twice_the_rate() {
    let limiter = RateLimiter::new(1000);
    assert_eq!(limiter.burst(), 2000);
}

#[test]
fn fresh_bucket_allows_burst() {
    let limiter = RateLimiter::new(1000);
    assert!(limiter.try_acquire(2000).is_ok());
    // Bucket now empty; the next request must wait.
    let wait = limiter.try_acquire(500).unwrap_err();
    assert!(wait > Duration::ZERO);
    assert!(wait <= Duration::from_secs(1));
}

#[test]
fn oversize_requests_are_capped_at_burst() {
    let limiter = RateLimiter::new(1000);
    // A request beyond the burst still succeeds by consuming the burst.
    assert!(limiter.try_acquire(1_000_000).is_ok());
}

#[tokio::test]
async fn acquire_chunks_and_completes() {
    // Very high rate so the test finishes instantly.
    let limiter = RateLimiter::new(u32::MAX as u64);
    limiter.acquire(10_000_000).await;
}

#[tokio::test]
async fn throttled_writer_passes_bytes_through() {
    let limiter = Arc::new(RateLimiter::new(u32::MAX as u64));
    let mut writer = ThrottledWriter::new(Vec::new(), limiter);
    writer.write_all(b"hello throttle").await.unwrap();
    writer.flush().await.unwrap();
    assert_eq!(writer.into_inner(), b"hello throttle");
}

#[tokio::test]
async fn throttled_writer_waits_for_tokens() {
    // 10 KB/s, burst 20 KB: a 25 KB write needs one refill pause.
    let limiter = Arc::new(RateLimiter::new(10_000));
    let mut writer = ThrottledWriter::new(Vec::new(), limiter);
    let start = std::time::Instant::now();
    writer.write_all(&[0u8; 25_000]).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(writer.into_inner().len(), 25_000);
}
