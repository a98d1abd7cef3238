//! Inbound API routes.
//!
//! Endpoints:
//! - `GET  /`        - service index
//! - `POST /query`   - run a deal question through the agent
//! - `GET  /search`  - pass free text straight to the sales backend

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dealdesk_agent::{answer, search::search, AgentRuntime, DealRequest, DealTools};
use dealdesk_core::{ApplicationError, CustomerId, InterfaceError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    agent: Arc<dyn AgentRuntime>,
    tools: Arc<dyn DealTools>,
}

impl ApiState {
    pub fn new(agent: Arc<dyn AgentRuntime>, tools: Arc<dyn DealTools>) -> Self {
        Self { agent, tools }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub company_name: Option<String>,
}

impl QueryRequest {
    fn into_deal_request(self) -> Result<DealRequest, ApplicationError> {
        let mut request = DealRequest::new(self.query);
        request.validate()?;
        if let Some(raw) = self.customer_id {
            request = request.with_customer_id(CustomerId::new(raw)?);
        }
        if let Some(company_name) = self.company_name {
            request = request.with_company_name(company_name);
        }
        Ok(request)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct AnswerResponse {
    pub response: String,
}

/// An [`InterfaceError`] rendered as `{"detail": ...}` with its status.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(
                event_name = "server.request.failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            warn!(
                event_name = "server.request.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }
        (status, Json(json!({ "detail": self.0.user_message() }))).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/query", post(handle_query))
        .route("/search", get(handle_search))
        .with_state(state)
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Deal desk API is running. Use /query endpoint to interact with the agent.",
        "endpoints": {
            "POST /query": "Send a query to the deal agent",
            "GET /search?q=your_search_term": "Send a search straight to the sales agent",
            "GET /health": "Backend reachability"
        }
    }))
}

pub async fn handle_query(
    State(state): State<ApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let request = payload
        .map_err(|rejection| ApplicationError::InvalidInput(rejection.body_text()))
        .and_then(|Json(body)| body.into_deal_request())
        .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;

    info!(
        event_name = "server.query.received",
        correlation_id = %correlation_id,
        query = %request.query,
        "processing query"
    );

    let response = answer(state.agent.as_ref(), request).await.map_err(|error| {
        ApiError(ApplicationError::from(error).into_interface(correlation_id.as_str()))
    })?;

    info!(
        event_name = "server.query.completed",
        correlation_id = %correlation_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query processed"
    );
    Ok(Json(AnswerResponse { response }))
}

pub async fn handle_search(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let text = params.q.or(params.search).unwrap_or_default();

    info!(
        event_name = "server.search.received",
        correlation_id = %correlation_id,
        search = %text,
        "processing search"
    );

    let response = search(state.tools.as_ref(), &text)
        .await
        .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;
    Ok(Json(AnswerResponse { response }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use dealdesk_agent::{
        AgentError, AgentEvent, AgentRuntime, DealAgent, DealRequest, DealTools, ToolFailure,
        ToolResult,
    };
    use dealdesk_core::CustomerId;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::{router, ApiState};

    /// Sales and deal backends answering from fixed documents.
    struct FakeTools {
        sales: ToolResult,
        sales_queries: Mutex<Vec<String>>,
    }

    impl FakeTools {
        fn new(sales: ToolResult) -> Arc<Self> {
            Arc::new(Self { sales, sales_queries: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl DealTools for FakeTools {
        async fn query_sales_agent(&self, query: &str) -> ToolResult {
            self.sales_queries.lock().expect("lock").push(query.to_string());
            self.sales.clone()
        }

        async fn get_deal_by_customer_id(&self, customer_id: CustomerId) -> ToolResult {
            match i64::from(customer_id) {
                7 => ToolResult::Success(json!({"bidHead": {"bidNum": 1000, "status": "Open"}})),
                other => ToolResult::Failure(
                    ToolFailure::http(404, "not found").with_customer_id(other),
                ),
            }
        }
    }

    struct FailingRuntime(AgentError);

    #[async_trait]
    impl AgentRuntime for FailingRuntime {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(
            &self,
            _request: DealRequest,
            _events: mpsc::Sender<AgentEvent>,
        ) -> Result<(), AgentError> {
            Err(self.0.clone())
        }
    }

    fn app(tools: Arc<FakeTools>) -> Router {
        let agent = Arc::new(DealAgent::new(tools.clone()));
        router(ApiState::new(agent, tools))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn post_query(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn query_resolves_name_and_returns_deal_summary() {
        let tools =
            FakeTools::new(ToolResult::Success(json!({"customers": [{"id": 7, "name": "Acme"}]})));

        let (status, body) =
            send(app(tools.clone()), post_query(json!({"query": "Find Acme's deal"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["response"],
            "Deal for Acme (customer id 7).\nBid header:\n- bidNum: 1000\n- status: Open"
        );
        assert_eq!(*tools.sales_queries.lock().expect("lock"), vec!["Get customer ID for Acme"]);
    }

    #[tokio::test]
    async fn explicit_customer_id_skips_sales() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));

        let (status, body) = send(
            app(tools.clone()),
            post_query(json!({"query": "show the deal", "customer_id": 7})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].as_str().expect("text").starts_with("Deal for customer id 7."));
        assert!(tools.sales_queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));

        let (status, body) = send(app(tools.clone()), post_query(json!({"query": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Query cannot be empty");
        assert!(tools.sales_queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_with_detail() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));

        let (status, body) = send(app(tools.clone()), post_query(json!({"customer_id": 7}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().expect("detail").contains("query"));

        let request = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(app(tools.clone()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
        assert!(tools.sales_queries.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn non_positive_customer_id_is_bad_request() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));

        let (status, _) =
            send(app(tools), post_query(json!({"query": "deal", "customer_id": -3}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overloaded_agent_maps_to_service_unavailable() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));
        let agent = Arc::new(FailingRuntime(AgentError::Overloaded("HTTP 503: busy".into())));
        let app = router(ApiState::new(agent, tools));

        let (status, body) = send(app, post_query(json!({"query": "deal for Acme"}))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["detail"],
            "The AI service is currently overloaded. Please try again later."
        );
    }

    #[tokio::test]
    async fn runtime_failure_maps_to_internal_error() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));
        let agent = Arc::new(FailingRuntime(AgentError::Runtime("model crashed".into())));
        let app = router(ApiState::new(agent, tools));

        let (status, body) = send(app, post_query(json!({"query": "deal for Acme"}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body["detail"].as_str().expect("detail");
        assert!(detail.starts_with("Error processing your request: "));
        assert!(detail.contains("model crashed"));
    }

    #[tokio::test]
    async fn search_passes_text_through_and_accepts_alias() {
        let tools = FakeTools::new(ToolResult::Success(json!({
            "response": "assistant: CompanyABC has a 5% rebate."
        })));

        let (status, body) = send(app(tools.clone()), get("/search?q=rebate%20CompanyABC")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "CompanyABC has a 5% rebate.");

        let (status, _) = send(app(tools.clone()), get("/search?search=discounts")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            *tools.sales_queries.lock().expect("lock"),
            vec!["rebate CompanyABC", "discounts"]
        );
    }

    #[tokio::test]
    async fn search_errors_map_to_status_codes() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));
        let (status, _) = send(app(tools), get("/search?q=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let tools = FakeTools::new(ToolResult::Failure(ToolFailure::http(503, "busy")));
        let (status, _) = send(app(tools), get("/search?q=x")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let tools =
            FakeTools::new(ToolResult::Failure(ToolFailure::transport("Request failed: refused")));
        let (status, _) = send(app(tools), get("/search?q=x")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let tools = FakeTools::new(ToolResult::Success(json!({})));
        let (status, body) = send(app(tools), get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"].get("POST /query").is_some());
    }
}
