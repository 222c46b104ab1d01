// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared token-bucket bandwidth limiting (tokens are bytes).

use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with burst = 2× rate. Requests larger than the burst are
/// chunked by the callers so they can always eventually proceed.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `rate` in bytes per second.
    pub fn new(rate: u64) -> Self {
        let rate = rate.max(1) as f64;
        Self {
            rate,
            burst: rate * 2.0,
            bucket: Mutex::new(Bucket {
                tokens: rate * 2.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Largest request that can ever be satisfied at once.
    pub fn burst(&self) -> u64 {
        self.burst as u64
    }

    /// Take `bytes` tokens now, or report how long to wait.
    pub fn try_acquire(&self, bytes: u64) -> Result<(), Duration> {
        let want = (bytes as f64).min(self.burst);
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_refill = now;
        if bucket.tokens >= want {
            bucket.tokens -= want;
            return Ok(());
        }
        let deficit = want - bucket.tokens;
        Err(Duration::from_secs_f64(deficit / self.rate))
    }

    /// Wait until `bytes` tokens are available, chunking oversize
    /// requests down to the burst.
    pub async fn acquire(&self, bytes: u64) {
        let mut remaining = bytes;
        while remaining > 0 {
            let chunk = remaining.min(self.burst());
            loop {
                match self.try_acquire(chunk) {
                    Ok(()) => break,
                    Err(wait) => tokio::time::sleep(wait).await,
                }
            }
            remaining -= chunk;
        }
    }
}

/// AsyncWrite adapter that meters bytes through a shared limiter. Used to
/// wrap download destinations when a bandwidth budget is configured.
pub struct ThrottledWriter<W> {
    inner: W,
    limiter: Arc<RateLimiter>,
    sleep: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl<W> ThrottledWriter<W> {
    pub fn new(inner: W, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner,
            limiter,
            sleep: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ThrottledWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Pin::new(&mut self.inner).poll_write(cx, buf);
        }
        loop {
            if let Some(sleep) = self.sleep.as_mut() {
                match sleep.as_mut().poll(cx) {
                    Poll::Ready(()) => self.sleep = None,
                    Poll::Pending => return Poll::Pending,
                }
            }
            let want = (buf.len() as u64).min(self.limiter.burst()).max(1);
            match self.limiter.try_acquire(want) {
                Ok(()) => {
                    return Pin::new(&mut self.inner).poll_write(cx, &buf[..want as usize]);
                }
                Err(wait) => {
                    self.sleep = Some(Box::pin(tokio::time::sleep(wait)));
                }
            }
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
#[path = "rate_tests.rs"]
mod tests;
