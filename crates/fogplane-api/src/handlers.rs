//! REST API handlers.
//!
//! Each handler resolves the caller, delegates to the control core and
//! returns a `{success, data?, error?, kind?}` JSON envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error};

use fogplane_control::{ControlError, ControlResult, MicroserviceUpdate, NewMicroservice};
use fogplane_core::UserId;

use crate::ApiState;

pub const USER_HEADER: &str = "x-user-id";
pub const FOG_TOKEN_HEADER: &str = "x-fog-token";

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        })
    }
}

fn error_response(msg: &str, kind: Option<&'static str>, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            kind,
        }),
    )
        .into_response()
}

fn status_for(err: &ControlError) -> StatusCode {
    match err {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::Validation(_) => StatusCode::BAD_REQUEST,
        ControlError::InconsistentRoute(_) => StatusCode::CONFLICT,
        ControlError::ConnectorPortsExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::TransactionAborted(_) | ControlError::State(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn control_error(err: ControlError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, kind = err.kind(), "request failed");
    } else {
        debug!(error = %err, kind = err.kind(), "request rejected");
    }
    error_response(&err.to_string(), Some(err.kind()), status)
}

fn respond<T: Serialize>(result: ControlResult<T>, status: StatusCode) -> Response {
    match result {
        Ok(data) => (status, ApiResponse::ok(data)).into_response(),
        Err(e) => control_error(e),
    }
}

/// The authenticated caller, from the `x-user-id` header.
fn caller(headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<UserId>().ok())
        .ok_or_else(|| {
            error_response(
                "missing or invalid x-user-id header",
                None,
                StatusCode::UNAUTHORIZED,
            )
        })
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /api/v1/catalog/microservices
pub async fn list_catalog_items(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.catalog.list_visible(user), StatusCode::OK)
}

/// GET /api/v1/catalog/microservices/:id
pub async fn get_catalog_item(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.catalog.get_visible(id, user), StatusCode::OK)
}

// ── Microservices ──────────────────────────────────────────────

/// GET /api/v1/microservices
pub async fn list_microservices(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.list(user), StatusCode::OK)
}

/// POST /api/v1/microservices
pub async fn create_microservice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<NewMicroservice>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.create(user, request), StatusCode::CREATED)
}

/// GET /api/v1/microservices/:uuid
pub async fn get_microservice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.get(user, &uuid), StatusCode::OK)
}

/// PATCH /api/v1/microservices/:uuid
pub async fn update_microservice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(update): Json<MicroserviceUpdate>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.update(user, &uuid, update), StatusCode::OK)
}

/// DELETE /api/v1/microservices/:uuid
pub async fn delete_microservice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(
        state.microservices.delete(user, &uuid).map(|()| "deleted"),
        StatusCode::OK,
    )
}

// ── Routes ─────────────────────────────────────────────────────

/// GET /api/v1/microservices/:uuid/routes
pub async fn list_routes(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.routes_for(user, &uuid), StatusCode::OK)
}

/// POST /api/v1/microservices/:uuid/routes/:dest
pub async fn add_route(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((uuid, dest)): Path<(String, String)>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(state.microservices.add_route(user, &uuid, &dest), StatusCode::OK)
}

/// DELETE /api/v1/microservices/:uuid/routes/:dest
pub async fn remove_route(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((uuid, dest)): Path<(String, String)>,
) -> Response {
    let user = match caller(&headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    respond(
        state.microservices.remove_route(user, &uuid, &dest),
        StatusCode::OK,
    )
}

/// POST /api/v1/routes/repair
pub async fn repair_routes(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(resp) = caller(&headers) {
        return resp;
    }
    respond(state.microservices.topology().repair_routes(), StatusCode::OK)
}

// ── Agent ──────────────────────────────────────────────────────

/// GET /api/v1/agent/microservices
pub async fn agent_microservices(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let Some(token) = headers.get(FOG_TOKEN_HEADER).and_then(|v| v.to_str().ok()) else {
        return error_response(
            "missing x-fog-token header",
            None,
            StatusCode::UNAUTHORIZED,
        );
    };
    let fog = match state.microservices.fog_for_token(token) {
        Ok(fog) => fog,
        Err(ControlError::NotFound(_)) => {
            return error_response("invalid fog token", None, StatusCode::UNAUTHORIZED);
        }
        Err(e) => return control_error(e),
    };
    respond(state.microservices.list_on_fog(&fog.uuid), StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use fogplane_control::ControlSettings;
    use fogplane_state::{CatalogItem, Fog, FogAccessToken, StateResult, StateStore};

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        store
            .transaction(|txn| -> StateResult<()> {
                for uuid in ["n1", "n2"] {
                    txn.put_fog(&Fog {
                        uuid: uuid.to_string(),
                        name: uuid.to_string(),
                        user_id: None,
                        fog_type_id: 1,
                        created_at: 0,
                    })?;
                }
                txn.put_fog_access_token(&FogAccessToken {
                    token: "secret".to_string(),
                    fog_uuid: "n1".to_string(),
                })?;
                txn.put_catalog_item(&CatalogItem {
                    id: 7,
                    name: "sensor".to_string(),
                    description: String::new(),
                    category: String::new(),
                    publisher: String::new(),
                    disk_required: 0,
                    ram_required: 0,
                    user_id: None,
                })?;
                Ok(())
            })
            .unwrap();
        ApiState::new(store, ControlSettings::default())
    }

    fn user(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(id).unwrap());
        headers
    }

    fn new_microservice(name: &str, fog: &str) -> NewMicroservice {
        NewMicroservice {
            name: name.to_string(),
            catalog_item_id: 7,
            iofog_uuid: Some(fog.to_string()),
            log_limit: 50,
            ..Default::default()
        }
    }

    fn create(state: &ApiState, name: &str, fog: &str) -> String {
        state
            .microservices
            .create(1, new_microservice(name, fog))
            .unwrap()
            .microservice
            .uuid
    }

    #[tokio::test]
    async fn missing_user_header_is_unauthorized() {
        let state = test_state();
        let resp = list_microservices(State(state), HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_and_get_microservice() {
        let state = test_state();
        let resp = create_microservice(
            State(state.clone()),
            user("1"),
            Json(new_microservice("a", "n1")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let uuid = state.microservices.list(1).unwrap()[0].microservice.uuid.clone();
        let resp = get_microservice(State(state.clone()), user("1"), Path(uuid.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = get_microservice(State(state), user("2"), Path(uuid)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let state = test_state();
        let request = NewMicroservice {
            root_enable: true,
            root_disable: true,
            ..new_microservice("a", "n1")
        };
        let resp = create_microservice(State(state), user("1"), Json(request)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_catalog_item_is_not_found() {
        let state = test_state();
        let resp = get_catalog_item(State(state.clone()), user("1"), Path(99)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = get_catalog_item(State(state), user("1"), Path(7)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_and_remove_route() {
        let state = test_state();
        let a = create(&state, "a", "n1");
        let b = create(&state, "b", "n2");

        let resp = add_route(State(state.clone()), user("1"), Path((a.clone(), b.clone()))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.microservices.routes_for(1, &a).unwrap().len(), 1);

        let resp =
            remove_route(State(state.clone()), user("1"), Path((a.clone(), b.clone()))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = remove_route(State(state), user("1"), Path((a, b))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_microservice_then_missing() {
        let state = test_state();
        let a = create(&state, "a", "n1");

        let resp = delete_microservice(State(state.clone()), user("1"), Path(a.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_microservice(State(state), user("1"), Path(a)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn agent_endpoint_requires_valid_token() {
        let state = test_state();
        create(&state, "a", "n1");

        let resp = agent_microservices(State(state.clone()), HeaderMap::new()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(FOG_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        let resp = agent_microservices(State(state.clone()), headers).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(FOG_TOKEN_HEADER, HeaderValue::from_static("secret"));
        let resp = agent_microservices(State(state), headers).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&ControlError::InconsistentRoute("gone".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ControlError::ConnectorPortsExhausted { start: 1, end: 2 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&ControlError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
