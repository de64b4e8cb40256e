#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::registry::heartbeat::monitor;
    use crate::registry::MonitorExit;
    use crate::store::RenewalAck;

    const POLL: Duration = Duration::from_secs(1);
    const STALE: Duration = Duration::from_secs(3);

    fn ack() -> RenewalAck {
        RenewalAck { lease_id: 7, ttl_seconds: 9 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_closure_is_failure() {
        let (tx, rx) = mpsc::channel(4);
        let scope = CancellationToken::new();
        tx.send(ack()).await.unwrap();
        tx.send(ack()).await.unwrap();
        drop(tx);

        let report = monitor(rx, &scope, 7, POLL, STALE).await;
        assert_eq!(report.exit, MonitorExit::StreamClosed);
        assert_eq!(report.renewals, 2);
        assert_eq!(report.stale_warnings, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_without_failure() {
        let (_tx, rx) = mpsc::channel::<RenewalAck>(4);
        let scope = CancellationToken::new();
        let cancel = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        });

        let report = monitor(rx, &scope, 7, POLL, STALE).await;
        assert_eq!(report.exit, MonitorExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closure_after_cancel_counts_as_cancelled() {
        let (tx, rx) = mpsc::channel::<RenewalAck>(4);
        let scope = CancellationToken::new();
        scope.cancel();
        drop(tx);

        let report = monitor(rx, &scope, 7, POLL, STALE).await;
        assert_eq!(report.exit, MonitorExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_only_warns() {
        let (tx, rx) = mpsc::channel(4);
        let scope = CancellationToken::new();
        let handle = tokio::spawn(async move { monitor(rx, &scope, 7, POLL, STALE).await });

        // No acks for 5.5s: polls at 4s and 5s see silence above 3s.
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert!(!handle.is_finished());

        tx.send(ack()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.exit, MonitorExit::StreamClosed);
        assert_eq!(report.renewals, 1);
        assert_eq!(report.stale_warnings, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_renewals_never_warn() {
        let (tx, rx) = mpsc::channel(4);
        let scope = CancellationToken::new();
        let handle = tokio::spawn(async move { monitor(rx, &scope, 7, POLL, STALE).await });

        for _ in 0..10 {
            tx.send(ack()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.renewals, 10);
        assert_eq!(report.stale_warnings, 0);
    }
}
