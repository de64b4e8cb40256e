// Package api provides the registration inspection and metadata endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use super::Controller;
use crate::model::Metadata;
use crate::registry::{Registrar, RegistryError};

pub const REGISTRATION_PATH: &str = "/registration";
pub const METADATA_PATH: &str = "/registration/metadata";

/// RegistrationController exposes the registrar snapshot and lets operators
/// merge metadata into the live record.
#[derive(Clone)]
pub struct RegistrationController {
    registrar: Arc<Registrar>,
}

impl RegistrationController {
    pub fn new(registrar: Arc<Registrar>) -> Self {
        Self { registrar }
    }

    async fn show(&self) -> Response {
        Json(self.registrar.snapshot().await).into_response()
    }

    async fn update_metadata(&self, delta: Metadata) -> Response {
        match self.registrar.update_metadata(delta).await {
            Ok(()) => Json(self.registrar.snapshot().await).into_response(),
            Err(RegistryError::NotRegistered) => (
                StatusCode::CONFLICT,
                Json(json!({ "status": 409, "error": RegistryError::NotRegistered.to_string() })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "status": 502, "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

impl Controller for RegistrationController {
    fn add_route(&self, router: Router) -> Router {
        let show = self.clone();
        let update = self.clone();
        router
            .route(
                REGISTRATION_PATH,
                get(move || {
                    let controller = show.clone();
                    async move { controller.show().await }
                }),
            )
            .route(
                METADATA_PATH,
                patch(move |Json(delta): Json<Metadata>| {
                    let controller = update.clone();
                    async move { controller.update_metadata(delta).await }
                }),
            )
    }
}
