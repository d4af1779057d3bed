use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use super::provider::{CompletionNotifier, CompletionSummary, NotifyError};
use crate::config::WebhookConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    tenant_id: &'a str,
    #[serde(flatten)]
    summary: &'a CompletionSummary,
}

/// Posts the completion summary as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NotifyError::Config(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NotifyError::Config(format!("header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, tenant_id: &str, summary: &CompletionSummary) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { tenant_id, summary })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(tenant_id, job_id = %summary.job_id, "Completion webhook delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReasonEntry;
    use axum::http::StatusCode;
    use axum::{Json, Router, extract::State, routing::post};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn summary() -> CompletionSummary {
        CompletionSummary {
            job_id: Uuid::new_v4(),
            job_type: "seo".to_string(),
            successful: 4,
            failed: 1,
            skipped: 0,
            duration_seconds: 130,
            skip_reasons: Vec::new(),
            fail_reasons: vec![ReasonEntry {
                item_id: "p-3".to_string(),
                reason: "model refused".to_string(),
            }],
        }
    }

    async fn serve(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(received): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                          Json(body): Json<serde_json::Value>| async move {
                        received.lock().unwrap().push(body);
                        status
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/hook", addr), received)
    }

    fn config(url: String) -> WebhookConfig {
        WebhookConfig {
            enabled: true,
            url,
            timeout_seconds: 5,
            headers: BTreeMap::from([("x-api-key".to_string(), "secret".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_posts_summary_json() {
        let (url, received) = serve(StatusCode::OK).await;
        let notifier = WebhookNotifier::new(&config(url)).unwrap();
        let summary = summary();

        notifier.notify("shop-a", &summary).await.unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["tenantId"], "shop-a");
        assert_eq!(bodies[0]["jobType"], "seo");
        assert_eq!(bodies[0]["durationSeconds"], 130);
        assert_eq!(bodies[0]["failReasons"][0]["itemId"], "p-3");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (url, _) = serve(StatusCode::BAD_GATEWAY).await;
        let notifier = WebhookNotifier::new(&config(url)).unwrap();

        let err = notifier.notify("shop-a", &summary()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 502 }));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let mut config = config("http://127.0.0.1:1/hook".to_string());
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());

        assert!(matches!(
            WebhookNotifier::new(&config),
            Err(NotifyError::Config(_))
        ));
    }
}
