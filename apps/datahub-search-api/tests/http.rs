use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use datahub_search_api::{
	routes::{self, HEADER_PERMISSIONS, HEADER_TEAM},
	state::AppState,
};
use datahub_testkit::fixtures;

const ALL_PERMISSIONS: &str = "company.read_company, interaction.read_interaction, \
	 investment.read_associated_investmentproject, investment.view_all_investmentproject";

fn app() -> Router {
	let cfg = fixtures::test_config().expect("Failed to build test config.");
	let index = fixtures::seeded_index().expect("Failed to seed index.");

	routes::router(AppState::with_backend(cfg, Arc::new(index)))
}

async fn post_json(
	uri: &str,
	permissions: &str,
	team: Option<&str>,
	body: Value,
) -> (StatusCode, Value) {
	let mut request = Request::builder()
		.method("POST")
		.uri(uri)
		.header(HEADER_PERMISSIONS, permissions)
		.header("content-type", "application/json");

	if let Some(team) = team {
		request = request.header(HEADER_TEAM, team);
	}

	let request = request.body(Body::from(body.to_string())).expect("Failed to build request.");
	let response = app().oneshot(request).await.expect("Failed to call search route.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json: Value = serde_json::from_slice(&body).expect("Failed to parse response.");

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let request =
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let response = app().oneshot(request).await.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn basic_search_returns_results_and_type_counts() {
	let (status, json) = post_json(
		"/v3/search",
		ALL_PERMISSIONS,
		None,
		json!({ "term": "acme", "entity": "company" }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["count"], 1);
	assert_eq!(json["results"][0]["id"], "c-acme");
	assert_eq!(
		json["aggregations"],
		json!([{ "entity": "interaction", "count": 3 }, { "entity": "company", "count": 1 }])
	);
}

#[tokio::test]
async fn entity_search_applies_date_filters() {
	let (status, json) = post_json(
		"/v3/search/interaction",
		ALL_PERMISSIONS,
		None,
		json!({ "date_after": "2017-12-01", "date_before": "2018-01-02" }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["count"], 1);
	assert_eq!(json["results"][0]["subject"], "Event at HQ");
	assert!(json.get("aggregations").is_none());
}

#[tokio::test]
async fn team_header_restricts_projects() {
	let (status, json) = post_json(
		"/v3/search/investment_project",
		"investment.read_associated_investmentproject",
		Some("team-b"),
		json!({}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["count"], 1);
	assert_eq!(json["results"][0]["id"], "p-2");
}

#[tokio::test]
async fn validation_errors_are_reported_by_field() {
	let (status, json) = post_json(
		"/v3/search/interaction",
		ALL_PERMISSIONS,
		None,
		json!({ "sortby": "subject:sideways", "date_after": "yesterday" }),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "VALIDATION_ERROR");
	assert_eq!(json["fields"]["non_field_errors"], json!(["Date(s) in incorrect format."]));
	assert_eq!(
		json["fields"]["sortby"],
		json!(["Invalid sort direction 'sideways', must be one of ('asc', 'desc')"])
	);
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
	let (status, json) = post_json("/v3/search/widget", ALL_PERMISSIONS, None, json!({})).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "UNKNOWN_ENTITY");
}

#[tokio::test]
async fn missing_read_permission_is_forbidden() {
	let (status, json) =
		post_json("/v3/search/interaction", "company.read_company", None, json!({})).await;

	assert_eq!(status, StatusCode::FORBIDDEN);
	assert_eq!(json["error_code"], "PERMISSION_DENIED");
}

#[tokio::test]
async fn non_object_body_is_rejected() {
	let (status, json) = post_json("/v3/search", ALL_PERMISSIONS, None, json!(["acme"])).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}
