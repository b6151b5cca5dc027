use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::modules::queue::dto::*;
use crate::modules::storage::dto::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::modules::queue::handler::list_queues,
        crate::modules::queue::handler::get_queue,
        crate::modules::queue::handler::enqueue_job,
        crate::modules::queue::handler::pop_job,
        crate::modules::storage::handler::list_objects,
        crate::modules::storage::handler::get_object,
        crate::modules::storage::handler::delete_objects,
        crate::modules::storage::handler::presign_object,
    ),
    components(
        schemas(
            crate::routes::HealthResponse,
            EnqueueJobRequest, EnqueueResponse, JobResponse, QueueSummary, QueueDepthResponse,
            ObjectListResponse, DeletePrefixResponse, PresignResponse,
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Queues", description = "Work queue inspection and control"),
        (name = "Storage", description = "Media object store operations")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
