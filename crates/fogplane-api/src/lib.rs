//! fogplane-api — REST API for the fogplane controller.
//!
//! Thin axum front door over `fogplane-control`. The caller's user id is
//! taken from the `x-user-id` header, already authenticated upstream;
//! agents identify their fog with the `x-fog-token` header.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/catalog/microservices` | List visible catalog items |
//! | GET | `/api/v1/catalog/microservices/:id` | Get a visible catalog item |
//! | GET | `/api/v1/microservices` | List the caller's microservices |
//! | POST | `/api/v1/microservices` | Create a microservice |
//! | GET | `/api/v1/microservices/:uuid` | Get a microservice |
//! | PATCH | `/api/v1/microservices/:uuid` | Partially update a microservice |
//! | DELETE | `/api/v1/microservices/:uuid` | Delete a microservice |
//! | GET | `/api/v1/microservices/:uuid/routes` | List outbound routes |
//! | POST | `/api/v1/microservices/:uuid/routes/:dest` | Add a route |
//! | DELETE | `/api/v1/microservices/:uuid/routes/:dest` | Remove a route |
//! | POST | `/api/v1/routes/repair` | Re-provision degraded routes |
//! | GET | `/api/v1/agent/microservices` | Microservices on the agent's fog |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use fogplane_control::{CatalogResolver, ControlSettings, MicroserviceManager};
use fogplane_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub microservices: MicroserviceManager,
    pub catalog: CatalogResolver,
}

impl ApiState {
    pub fn new(store: StateStore, settings: ControlSettings) -> Self {
        Self {
            microservices: MicroserviceManager::new(store.clone(), settings),
            catalog: CatalogResolver::new(store),
        }
    }
}

/// Build the complete API router.
pub fn build_router(store: StateStore, settings: ControlSettings) -> Router {
    let api_state = ApiState::new(store, settings);

    let api_routes = Router::new()
        .route("/catalog/microservices", get(handlers::list_catalog_items))
        .route("/catalog/microservices/{id}", get(handlers::get_catalog_item))
        .route(
            "/microservices",
            get(handlers::list_microservices).post(handlers::create_microservice),
        )
        .route(
            "/microservices/{uuid}",
            get(handlers::get_microservice)
                .patch(handlers::update_microservice)
                .delete(handlers::delete_microservice),
        )
        .route("/microservices/{uuid}/routes", get(handlers::list_routes))
        .route(
            "/microservices/{uuid}/routes/{dest}",
            post(handlers::add_route).delete(handlers::remove_route),
        )
        .route("/routes/repair", post(handlers::repair_routes))
        .route("/agent/microservices", get(handlers::agent_microservices))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
