use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
	response::Response,
};
use serde_json::Value;
use tower::util::ServiceExt;

use graphrag_api::{routes, state::AppState};
use graphrag_domain::Modality;
use graphrag_service::{Backends, Providers, Stores};
use graphrag_testkit::{MemoryAuthorityStore, StaticBackend, item};

fn state() -> AppState {
	let vector = StaticBackend::new(vec![
		item("doc-1", Modality::Vector, "Pembrolizumab is a PD-1 inhibitor.", "fda"),
		item("doc-2", Modality::Vector, "Melanoma response rates improved.", "pubmed"),
	]);
	let authority = MemoryAuthorityStore::new();

	authority.set_source("fda", 1.0);

	let service = graphrag_testkit::service(
		Backends { vector: Some(Arc::new(vector)), keyword: None, graph: None },
		Stores { profiles: None, authority: Some(Arc::new(authority)) },
		Providers::default(),
	)
	.expect("Failed to build service.");

	AppState::from_service(service)
}

async fn post_json(app: Router, uri: &str, payload: String) -> Response {
	app.oneshot(
		Request::builder()
			.method("POST")
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(payload))
			.expect("Failed to build request."),
	)
	.await
	.expect("Failed to call router.")
}

async fn json_body(response: Response) -> Value {
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&body).expect("Failed to parse response.")
}

#[tokio::test]
async fn health_ok() {
	let app = routes::router(state());
	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."))
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn retrieve_returns_cited_chunks() {
	let app = routes::router(state());
	let payload = serde_json::json!({ "query": "pd-1 inhibitors", "caller_id": "agent-7" });
	let response = post_json(app, "/v1/retrieve", payload.to_string()).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["chunks"][0]["id"], "doc-1");
	assert_eq!(json["chunks"][0]["citation"], "[1]");
	assert_eq!(json["citations"][1]["chunk_id"], "doc-2");
	assert_eq!(json["metadata"]["profile_id"], "global_default");
	assert_eq!(json["metadata"]["modalities"]["vector"]["status"], "ok");
	assert_eq!(json["metadata"]["modalities"]["graph"]["status"], "skipped");
	assert_eq!(json["metadata"]["no_backends_responded"], false);
	assert!(json.get("evidence").is_none());
}

#[tokio::test]
async fn retrieve_rejects_invalid_caller() {
	let app = routes::router(state());
	let payload = serde_json::json!({ "query": "pd-1", "caller_id": "not a valid id" });
	let response = post_json(app, "/v1/retrieve", payload.to_string()).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn retrieve_rejects_malformed_json() {
	let app = routes::router(state());
	let response = post_json(app, "/v1/retrieve", "{\"query\":".to_string()).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn admin_refresh_reports_table_sizes() {
	let admin = routes::admin_router(state());
	let response = post_json(admin, "/v1/admin/authority/refresh", String::new()).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["sources"], 1);
	assert_eq!(json["document_types"], 0);
}

#[tokio::test]
async fn admin_invalidate_succeeds_on_empty_cache() {
	let admin = routes::admin_router(state());
	let response = post_json(admin, "/v1/admin/profiles/invalidate", String::new()).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["evicted"], 0);
}
