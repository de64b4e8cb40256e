#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::store::{bounded, renewal_interval, Call, CoordinationStore, MemoryStore, StoreError};

    #[tokio::test]
    async fn test_keys_follow_their_lease() {
        let store = MemoryStore::new();
        let lease = store.grant_lease(10).await.unwrap();
        store.put("/services/a/1", b"one".to_vec(), lease).await.unwrap();
        store.put("/services/a/2", b"two".to_vec(), lease).await.unwrap();
        assert_eq!(store.lease_of("/services/a/1"), Some(lease));
        assert_eq!(store.lease_ttl(lease), Some(10));

        store.revoke_lease(lease).await.unwrap();
        assert!(store.is_empty());
        assert!(store.live_leases().is_empty());

        // revoking again is not an error
        store.revoke_lease(lease).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_distinguishes_absent_from_unreachable() {
        let store = MemoryStore::new();
        let err = store.get("/missing").await.unwrap_err();
        assert!(err.is_not_found());

        store.set_unreachable(true);
        let err = store.get("/missing").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_requires_live_lease() {
        let store = MemoryStore::new();
        let err = store.put("/k", Vec::new(), 42).await.unwrap_err();
        assert!(matches!(err, StoreError::LeaseNotFound(42)));
    }

    #[tokio::test]
    async fn test_rebinding_key_detaches_it_from_old_lease() {
        let store = MemoryStore::new();
        let first = store.grant_lease(5).await.unwrap();
        let second = store.grant_lease(5).await.unwrap();
        store.put("/k", b"v1".to_vec(), first).await.unwrap();
        store.put("/k", b"v2".to_vec(), second).await.unwrap();

        store.revoke_lease(first).await.unwrap();
        assert_eq!(store.value("/k"), Some(b"v2".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_stream_acks_until_lease_expires() {
        let store = MemoryStore::with_renewal_interval(Duration::from_millis(100));
        let lease = store.grant_lease(3).await.unwrap();
        let (_guard, mut acks) = store.open_renewal_stream(lease).await.unwrap().into_parts();

        let ack = acks.recv().await.unwrap();
        assert_eq!(ack.lease_id, lease);
        assert!(acks.recv().await.is_some());

        assert!(store.expire_lease(lease));
        // drain whatever was buffered, then the stream must close
        while acks.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_stops_renewer() {
        let store = MemoryStore::with_renewal_interval(Duration::from_millis(100));
        let lease = store.grant_lease(3).await.unwrap();
        let (guard, mut acks) = store.open_renewal_stream(lease).await.unwrap().into_parts();
        assert!(acks.recv().await.is_some());

        drop(guard);
        while acks.recv().await.is_some() {}
        // lease itself is untouched
        assert_eq!(store.live_leases(), vec![lease]);
    }

    #[tokio::test]
    async fn test_journal_records_failed_calls() {
        let store = MemoryStore::new();
        store.fail_grant(true);
        assert!(store.grant_lease(5).await.is_err());
        assert_eq!(store.calls(), vec![Call::GrantLease(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_maps_elapsed_to_timeout() {
        let limit = Duration::from_millis(50);
        let res: Result<(), StoreError> = bounded(limit, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(StoreError::Timeout(d)) if d == limit));
    }

    #[test]
    fn test_renewal_interval_is_third_of_ttl() {
        assert_eq!(renewal_interval(30), Duration::from_secs(10));
        assert_eq!(renewal_interval(10), Duration::from_secs(3));
        assert_eq!(renewal_interval(1), Duration::from_secs(1));
    }
}
