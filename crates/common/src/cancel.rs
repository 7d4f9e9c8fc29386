use std::time::Duration;

use tokio::sync::watch;

/// Sleep for `period` unless a stop is requested first.
///
/// Returns `true` when the caller should exit: the stop flag is set, or
/// every sender is gone.
pub async fn sleep_or_stop(stop_rx: &mut watch::Receiver<bool>, period: Duration) -> bool {
    if *stop_rx.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = stop_rx.wait_for(|stop| *stop) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_false_after_full_sleep() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!sleep_or_stop(&mut rx, Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn wakes_early_on_stop() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { sleep_or_stop(&mut rx, Duration::from_secs(60)).await });
        tx.send_replace(true);
        let stopped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("sleep was not interrupted")
            .unwrap();
        assert!(stopped);
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_stop() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(sleep_or_stop(&mut rx, Duration::from_secs(60)).await);
    }
}
