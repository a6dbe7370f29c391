mod error;

pub use error::{Error, Result};

use std::time::Duration as StdDuration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use datahub_config::Elasticsearch;

/// Error bodies are cut to this many characters before they are reported.
const ERROR_BODY_LIMIT: usize = 512;

/// `POST {url}/{index}/_search`, returning the decoded response.
pub async fn search(cfg: &Elasticsearch, index: &str, body: &Value) -> Result<Value> {
	let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;
	let res = client
		.post(search_url(&cfg.url, index))
		.headers(auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body: truncate(&body) });
	}

	Ok(res.json().await?)
}

pub fn search_url(base: &str, index: &str) -> String {
	format!("{}/{index}/_search", base.trim_end_matches('/'))
}

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("ApiKey {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

fn truncate(body: &str) -> String {
	match body.char_indices().nth(ERROR_BODY_LIMIT) {
		Some((end, _)) => format!("{}...", &body[..end]),
		None => body.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn search_url_joins_without_double_slash() {
		assert_eq!(search_url("http://es:9200/", "datahub"), "http://es:9200/datahub/_search");
		assert_eq!(search_url("http://es:9200", "datahub"), "http://es:9200/datahub/_search");
	}

	#[test]
	fn api_key_and_default_headers_are_sent() {
		let defaults = json!({ "x-opaque-id": "datahub-search" });
		let headers = auth_headers(Some("abc"), defaults.as_object().expect("object"))
			.expect("valid headers");

		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("ApiKey abc"));
		assert_eq!(
			headers.get("x-opaque-id").and_then(|v| v.to_str().ok()),
			Some("datahub-search")
		);
	}

	#[test]
	fn no_api_key_sends_no_authorization() {
		let headers = auth_headers(None, &Map::new()).expect("valid headers");

		assert!(headers.get(AUTHORIZATION).is_none());
	}

	#[test]
	fn non_string_default_header_is_rejected() {
		let defaults = json!({ "x-retries": 3 });
		let err = auth_headers(None, defaults.as_object().expect("object"))
			.expect_err("non-string header");

		assert!(matches!(err, Error::InvalidConfig { .. }));
	}

	#[test]
	fn long_error_bodies_are_truncated() {
		let body = "x".repeat(ERROR_BODY_LIMIT + 10);

		assert_eq!(truncate(&body).len(), ERROR_BODY_LIMIT + 3);
		assert_eq!(truncate("short"), "short");
	}
}
