//! Admin API driven in-process.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use dynamic_gateway::admin::admin_router;
use dynamic_gateway::routing::RouteDefinition;
use dynamic_gateway::store::ConfigKey;

mod common;

use common::{next_refresh, Gateway};

async fn call(app: &Router, method: Method, body: Option<String>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri("/admin/routes");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_status_reports_source_and_routes() {
    let gateway = Gateway::new();
    gateway
        .service
        .add(RouteDefinition::new("a", "lb://a"))
        .unwrap();
    let state = gateway
        .state()
        .with_source(ConfigKey::new("gateway-routes", "DEFAULT_GROUP"));
    let app = admin_router(state);

    let response = app
        .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["routes"], 1);
    assert_eq!(body["routeVersion"], 1);
    assert_eq!(body["source"], "gateway-routes@DEFAULT_GROUP");
}

#[tokio::test]
async fn test_route_lifecycle() {
    let gateway = Gateway::new();
    let mut refresh = gateway.service.subscribe();
    let app = admin_router(gateway.state());

    let route = json!({
        "id": "tenant-2",
        "uri": "lb://tenant",
        "predicates": [{"name": "EntIdCheck", "args": {"entId": "1,2,3"}}]
    });
    let (status, body) = call(&app, Method::POST, Some(route.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    next_refresh(&mut refresh).await;

    let (status, body) = call(&app, Method::GET, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"][0]["id"], "tenant-2");
    assert_eq!(body["routes"][0]["predicates"][0]["args"]["entId"], "1,2,3");

    let payload = r#"[{"id":"x","uri":"lb://x"},{"id":"","uri":"lb://y"}]"#;
    let (status, body) = call(&app, Method::PUT, Some(payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 1);
    assert_eq!(body["rejected"].as_array().unwrap().len(), 1);
    next_refresh(&mut refresh).await;
    assert_eq!(gateway.table.snapshot().ids(), vec!["x"]);

    let (status, body) = call(&app, Method::DELETE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    next_refresh(&mut refresh).await;
    assert!(gateway.table.snapshot().is_empty());

    // Deleting an empty table changes nothing and signals nothing
    let (_, body) = call(&app, Method::DELETE, None).await;
    assert_eq!(body["changed"], false);
    assert!(refresh.try_recv().is_err());
}

#[tokio::test]
async fn test_bad_requests_leave_table_untouched() {
    let gateway = Gateway::new();
    gateway
        .service
        .add(RouteDefinition::new("keep", "lb://keep"))
        .unwrap();
    let mut refresh = gateway.service.subscribe();
    let app = admin_router(gateway.state());

    let unknown = json!({
        "id": "broken",
        "uri": "lb://broken",
        "predicates": [{"name": "Nope"}]
    });
    let (status, body) = call(&app, Method::POST, Some(unknown.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("broken"));

    let (status, _) = call(&app, Method::PUT, Some("{not a list".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(gateway.table.snapshot().ids(), vec!["keep"]);
    assert!(refresh.try_recv().is_err());
}
