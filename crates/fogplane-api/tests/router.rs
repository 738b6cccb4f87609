//! End-to-end requests through the assembled router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fogplane_api::build_router;
use fogplane_control::ControlSettings;
use fogplane_state::{CatalogItem, Fog, StateResult, StateStore};

fn test_router() -> Router {
    let store = StateStore::open_in_memory().unwrap();
    store
        .transaction(|txn| -> StateResult<()> {
            for uuid in ["N1", "N2"] {
                txn.put_fog(&Fog {
                    uuid: uuid.to_string(),
                    name: uuid.to_string(),
                    user_id: None,
                    fog_type_id: 1,
                    created_at: 0,
                })?;
            }
            for (id, owner) in [(7, None), (8, Some(2))] {
                txn.put_catalog_item(&CatalogItem {
                    id,
                    name: format!("item-{id}"),
                    description: String::new(),
                    category: String::new(),
                    publisher: String::new(),
                    disk_required: 0,
                    ram_required: 0,
                    user_id: owner,
                })?;
            }
            Ok(())
        })
        .unwrap();
    build_router(store, ControlSettings::default())
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "1");
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn catalog_lists_only_visible_items_without_owner() {
    let router = test_router();
    let (status, body) = send(&router, "GET", "/api/v1/catalog/microservices", None).await;

    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], 7);
    assert!(items[0].get("userId").is_none());
}

#[tokio::test]
async fn microservice_crud_and_routing_over_http() {
    let router = test_router();

    let (status, a) = send(
        &router,
        "POST",
        "/api/v1/microservices",
        Some(json!({
            "name": "A",
            "catalogItemId": 7,
            "ioFogNodeId": "N1",
            "ports": ["80:8080:false", "bogus"],
            "volumeMappings": ["/var/data:/data"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["success"], true);
    assert_eq!(a["data"]["ports"].as_array().unwrap().len(), 1);
    assert_eq!(a["data"]["logLimit"], 50);
    let a = a["data"]["uuid"].as_str().unwrap().to_string();

    let (_, b) = send(
        &router,
        "POST",
        "/api/v1/microservices",
        Some(json!({ "name": "B", "catalogItemId": 7, "ioFogNodeId": "N2" })),
    )
    .await;
    let b = b["data"]["uuid"].as_str().unwrap().to_string();

    let (status, routing) = send(
        &router,
        "POST",
        &format!("/api/v1/microservices/{a}/routes/{b}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(routing["data"]["isNetworkConnection"], true);

    let (status, updated) = send(
        &router,
        "PATCH",
        &format!("/api/v1/microservices/{a}"),
        Some(json!({ "config": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["config"], "");
    assert_eq!(updated["data"]["name"], "A");
    assert_eq!(updated["data"]["routes"], json!([b.clone()]));

    let (status, _) = send(&router, "DELETE", &format!("/api/v1/microservices/{b}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, routes) = send(&router, "GET", &format!("/api/v1/microservices/{a}/routes"), None).await;
    assert!(routes["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn errors_carry_kind_and_message() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/microservices",
        Some(json!({ "name": "A", "catalogItemId": 8, "ioFogNodeId": "N1" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "NotFoundError");
    assert!(body["error"].as_str().unwrap().contains("catalog item"));
}
