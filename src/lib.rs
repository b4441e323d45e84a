//! Shared helpers for the procstream integration tests

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// Drain `rx` until it closes; `None` if it is still open after `limit`
pub async fn collect_until_closed<T>(rx: &mut mpsc::Receiver<T>, limit: Duration) -> Option<Vec<T>> {
    let deadline = Instant::now() + limit;
    let mut items = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, rx.recv()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => return Some(items),
            Err(_) => return None,
        }
    }
}

/// Whether `rx` closes within `limit`, discarding anything still buffered
pub async fn closes_within<T>(rx: &mut mpsc::Receiver<T>, limit: Duration) -> bool {
    collect_until_closed(rx, limit).await.is_some()
}

/// Receive exactly `n` items or fail after `limit`
pub async fn take<T>(rx: &mut mpsc::Receiver<T>, n: usize, limit: Duration) -> Option<Vec<T>> {
    let deadline = Instant::now() + limit;
    let mut items = Vec::with_capacity(n);

    while items.len() < n {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, rx.recv()).await {
            Ok(Some(item)) => items.push(item),
            _ => return None,
        }
    }
    Some(items)
}
