#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::controller::{Controller, HealthProbeController, RegistrationController};
    use crate::health::{Aggregator, RegistrationCheck};
    use crate::model::ServiceDescriptor;
    use crate::registry::Registrar;
    use crate::store::{CoordinationStore, MemoryStore};

    fn router(registrar: Arc<Registrar>) -> Router {
        let aggregator = Arc::new(
            Aggregator::new(std::time::Duration::from_secs(1))
                .with_checker(Arc::new(RegistrationCheck::new(registrar.clone()))),
        );
        let router = RegistrationController::new(registrar).add_route(Router::new());
        HealthProbeController::new(aggregator).add_route(router)
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_patch_requires_registration() {
        let store: Arc<dyn CoordinationStore> = Arc::new(MemoryStore::new());
        let app = router(Registrar::builder(store).build());

        let resp = app
            .clone()
            .oneshot(
                Request::patch("/registration/metadata")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"zone":"b"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metadata_patch_merges_into_record() {
        let store = Arc::new(MemoryStore::new());
        let registrar = Registrar::builder(store.clone()).build();
        let descriptor = ServiceDescriptor::new("svc", "i-1", "127.0.0.1:1", 9).with_metadata("zone", "a");
        registrar.register(descriptor.clone()).await.unwrap();
        let app = router(registrar.clone());

        let resp = app
            .clone()
            .oneshot(
                Request::patch("/registration/metadata")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"zone":"b","shard":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["state"], "registered");
        assert_eq!(json["descriptor"]["metadata"]["zone"], "b");

        let stored = ServiceDescriptor::from_bytes(&store.value(&descriptor.key()).unwrap()).unwrap();
        assert_eq!(stored.metadata.get("shard").map(String::as_str), Some("1"));

        let resp = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["checks"]["registration"]["status"], "healthy");

        registrar.shutdown().await;
    }
}
