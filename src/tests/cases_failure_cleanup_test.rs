use crate::registry::{RegistrationState, RegistryError};
use crate::support::{builder, descriptor, memory_store};

#[tokio::test(start_paused = true)]
async fn test_lease_grant_failure_leaves_nothing() {
    let store = memory_store();
    let registrar = builder(store.clone()).build();
    store.fail_grant(true);

    let err = registrar.register(descriptor("billing", "b-1")).await.unwrap_err();

    assert!(matches!(err, RegistryError::LeaseGrantFailed(_)));
    assert!(store.is_empty());
    assert!(store.live_leases().is_empty());
    assert_eq!(registrar.snapshot().await.state, RegistrationState::Unregistered);
    assert_eq!(registrar.supervision_tasks().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_put_failure_revokes_lease() {
    let store = memory_store();
    let registrar = builder(store.clone()).build();
    store.fail_put(true);

    let err = registrar.register(descriptor("billing", "b-1")).await.unwrap_err();

    assert!(matches!(err, RegistryError::PutFailed(_)));
    assert!(store.is_empty());
    assert!(store.live_leases().is_empty());
    assert!(!registrar.is_registered().await);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_failure_removes_key_and_lease() {
    let store = memory_store();
    let registrar = builder(store.clone()).build();
    store.fail_keepalive(true);

    let err = registrar.register(descriptor("billing", "b-1")).await.unwrap_err();

    assert!(matches!(err, RegistryError::KeepAliveStartFailed(_)));
    assert!(store.is_empty());
    assert!(store.live_leases().is_empty());
    assert!(!registrar.is_registered().await);
    assert_eq!(registrar.supervision_tasks().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reregister_drops_previous_registration() {
    let store = memory_store();
    let registrar = builder(store.clone()).build();
    registrar.register(descriptor("billing", "b-1")).await.unwrap();

    store.fail_put(true);
    let err = registrar.register(descriptor("billing", "b-1")).await.unwrap_err();

    assert!(matches!(err, RegistryError::PutFailed(_)));
    assert!(store.live_leases().is_empty());
    assert!(!registrar.is_registered().await);
    store.fail_put(false);
}

#[tokio::test(start_paused = true)]
async fn test_register_succeeds_after_transient_failure() {
    let store = memory_store();
    let registrar = builder(store.clone()).build();
    store.set_unreachable(true);
    assert!(registrar.register(descriptor("billing", "b-1")).await.is_err());

    store.set_unreachable(false);
    registrar.register(descriptor("billing", "b-1")).await.unwrap();

    assert!(registrar.is_registered().await);
    assert_eq!(store.live_leases().len(), 1);
    registrar.shutdown().await;
}
