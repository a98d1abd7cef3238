use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Path, routing::get, routing::post, Json, Router};
use dealdesk_agent::{BackendClient, BackendEndpoints, BackendTools, ToolRegistry};
use dealdesk_mcp::DealDeskMcpServer;
use serde_json::{json, Map, Value};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{address}")
}

async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{address}")
}

fn server(sales_url: String, deal_url: String) -> DealDeskMcpServer {
    let backend = BackendTools::new(
        BackendClient::new().expect("client"),
        BackendEndpoints {
            sales_url,
            deal_url,
            sales_timeout: Duration::from_secs(5),
            deal_timeout: Duration::from_secs(5),
        },
    );
    DealDeskMcpServer::new(Arc::new(ToolRegistry::with_backend(Arc::new(backend))))
}

fn arguments(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

#[tokio::test]
async fn lists_exactly_the_two_backend_tools() {
    let server = server(closed_port_url().await, closed_port_url().await);

    let names: Vec<String> = server.tools().iter().map(|tool| tool.name.to_string()).collect();

    assert_eq!(names, vec!["get_deal_by_customer_id", "query_sales_agent"]);
}

#[tokio::test]
async fn deal_lookup_returns_backend_payload() {
    let deals = serve(Router::new().route(
        "/api/getdeal/customer/{id}",
        get(|Path(id): Path<i64>| async move {
            Json(json!({ "bidHead": { "customer_id": id, "bid_number": "B-7" } }))
        }),
    ))
    .await;
    let server = server(closed_port_url().await, deals);

    let result = server
        .run_tool("get_deal_by_customer_id", arguments(json!({ "customer_id": 42 })))
        .await
        .expect("known tool");

    assert!(result.is_success());
    assert_eq!(result.to_json()["bidHead"]["bid_number"], "B-7");

    let call = server
        .dispatch("get_deal_by_customer_id", arguments(json!({ "customer_id": 42 })))
        .await
        .expect("known tool");
    assert_ne!(call.is_error, Some(true));
}

#[tokio::test]
async fn unreachable_backend_is_a_tool_error_not_a_protocol_error() {
    let server = server(closed_port_url().await, closed_port_url().await);

    let result = server
        .run_tool("query_sales_agent", arguments(json!({ "query": "Get customer ID for Acme" })))
        .await
        .expect("known tool");
    let document = result.to_json();
    assert_eq!(document["status"], "error");
    assert_eq!(document["kind"], "transport_error");

    let call = server
        .dispatch("query_sales_agent", arguments(json!({ "query": "Get customer ID for Acme" })))
        .await
        .expect("known tool");
    assert_eq!(call.is_error, Some(true));
}

#[tokio::test]
async fn sales_query_posts_to_backend() {
    let sales = serve(Router::new().route(
        "/query",
        post(|Json(body): Json<Value>| async move {
            Json(json!({ "response": format!("echo: {}", body["query"].as_str().unwrap_or("")) }))
        }),
    ))
    .await;
    let server = server(sales, closed_port_url().await);

    let result = server
        .run_tool("query_sales_agent", arguments(json!({ "query": "hello" })))
        .await
        .expect("known tool");

    assert_eq!(result.to_json()["response"], "echo: hello");
}
