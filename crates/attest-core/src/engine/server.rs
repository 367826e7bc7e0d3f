//! Remote OPA server driver
//!
//! Targets a running OPA server over its REST API: policies are uploaded
//! once at startup via `PUT /v1/policies/<name>` and queries are made via
//! `POST /v1/data/<package-path>` with the input document in the request
//! body. The response body is returned verbatim to the result extractor.

use crate::error::Result;
use crate::policy::Policy;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Driver for a remote OPA server
#[derive(Debug, Clone)]
pub struct OpaServer {
    client: reqwest::Client,
    base_url: String,
}

impl OpaServer {
    /// Creates a driver targeting `base_url` (e.g. `http://localhost:8181`)
    #[must_use]
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Base URL of the targeted server
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads policy sources, keyed by filename sans extension
    ///
    /// Individual rejections are logged and skipped so one bad policy does
    /// not block the rest of the upload.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; the signature leaves room for
    /// transport-level setup failures.
    pub async fn upload_policies(&self, policies: &[&Policy]) -> Result<()> {
        for policy in policies {
            let name = policy.stem();
            let url = format!("{}/v1/policies/{name}", self.base_url);
            debug!("Uploading policy '{name}' to {url}");

            match self
                .client
                .put(&url)
                .header("Content-Type", "text/plain")
                .body(policy.source.clone())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    warn!("Failed to upload policy {name}: {}", response.status());
                }
                Err(e) => {
                    error!("Error uploading policy {name}: {e}");
                }
            }
        }
        info!("Uploaded {} policies to OPA server", policies.len());
        Ok(())
    }

    /// Evaluates a query against the server
    ///
    /// The decision query (`data.<package>.compliance_report`) is mapped to
    /// the server's data API path. Always returns a structured document;
    /// HTTP and transport failures are reported through an `error` key.
    pub async fn evaluate(&self, query: &str, input: &Value, deadline: Duration) -> Value {
        let path = query.strip_prefix("data.").unwrap_or(query).replace('.', "/");
        let url = format!("{}/v1/data/{path}", self.base_url);
        debug!("Querying OPA server: {url}");

        let request = self
            .client
            .post(&url)
            .timeout(deadline)
            .json(&json!({"input": input}));

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                response.json::<Value>().await.unwrap_or_else(|e| {
                    json!({"error": format!("Failed to parse OPA server response: {e}")})
                })
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let message = format!("OPA server returned status code: {status}, body: {body}");
                error!("{message}");
                json!({"error": message})
            }
            Err(e) => {
                let message = format!("Error connecting to OPA server: {e}");
                error!("{message}");
                json!({"error": message})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyLibrary;
    use httpmock::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn library_with_one_policy() -> (TempDir, PolicyLibrary) {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join("global/v1/accountability/accountability.rego");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "package global.v1.accountability\n\ndefault allow := false\n").unwrap();
        let library = PolicyLibrary::open(dir.path()).unwrap();
        (dir, library)
    }

    #[tokio::test]
    async fn test_upload_policies_puts_source() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/v1/policies/accountability")
                    .body_contains("package global.v1.accountability");
                then.status(200);
            })
            .await;

        let (_dir, library) = library_with_one_policy();
        let policies: Vec<&Policy> = library.all_policies().iter().collect();
        let opa = OpaServer::new(server.base_url());
        opa.upload_policies(&policies).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_evaluate_posts_input_and_returns_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/data/global/v1/accountability/compliance_report")
                    .json_body_partial(r#"{"input": {"params": {}}}"#);
                then.status(200).json_body(
                    json!({"result": {"policy": "Accountability", "overall_result": true}}),
                );
            })
            .await;

        let opa = OpaServer::new(server.base_url());
        let result = opa
            .evaluate(
                "data.global.v1.accountability.compliance_report",
                &json!({"params": {}}),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(result["result"]["overall_result"], json!(true));
    }

    #[tokio::test]
    async fn test_evaluate_surfaces_http_failure_as_error_document() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains("/v1/data/");
                then.status(500).body("internal error");
            })
            .await;

        let opa = OpaServer::new(server.base_url());
        let result = opa
            .evaluate("data.x.compliance_report", &json!({}), Duration::from_secs(5))
            .await;

        assert!(result["error"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_evaluate_surfaces_connection_failure() {
        let opa = OpaServer::new("http://127.0.0.1:1");
        let result = opa
            .evaluate("data.x.compliance_report", &json!({}), Duration::from_secs(1))
            .await;

        assert!(
            result["error"]
                .as_str()
                .unwrap()
                .contains("Error connecting to OPA server")
        );
    }
}
