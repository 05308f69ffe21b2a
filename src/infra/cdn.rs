//! CDN invalidation backends.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{CdnError, CdnInvalidator, mutex_lock};

const SOURCE: &str = "infra::cdn";

/// Purge request body understood by the CDN's invalidation endpoint.
#[derive(Debug, Serialize)]
struct InvalidationRequest<'a> {
    paths: &'a [String],
    caller_reference: String,
}

/// POSTs invalidation batches to an HTTP purge endpoint.
#[derive(Debug, Clone)]
pub struct HttpCdnInvalidator {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpCdnInvalidator {
    pub fn new(endpoint: Url, token: Option<String>, timeout: Duration) -> Result<Self, CdnError> {
        let client = Client::builder()
            .user_agent(concat!("toggleboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| CdnError::new(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl CdnInvalidator for HttpCdnInvalidator {
    async fn invalidate(&self, paths: &[String]) -> Result<(), CdnError> {
        let body = InvalidationRequest {
            paths,
            caller_reference: Uuid::new_v4().to_string(),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| CdnError::new(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CdnError::new(format!("status {status} body {text}")));
        }

        debug!(
            target = SOURCE,
            caller_reference = %body.caller_reference,
            count = paths.len(),
            "cdn purge submitted"
        );
        Ok(())
    }
}

/// Used when no CDN fronts the edge objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCdnInvalidator;

#[async_trait]
impl CdnInvalidator for NoopCdnInvalidator {
    async fn invalidate(&self, paths: &[String]) -> Result<(), CdnError> {
        debug!(target = SOURCE, count = paths.len(), "no cdn configured; skipping purge");
        Ok(())
    }
}

/// Records every batch it receives; can be told to fail the next call.
#[derive(Debug, Default)]
pub struct RecordingCdnInvalidator {
    state: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    batches: Vec<Vec<String>>,
    fail_next: bool,
}

impl RecordingCdnInvalidator {
    pub fn fail_next(&self) {
        mutex_lock(&self.state, SOURCE, "fail_next").fail_next = true;
    }

    /// Successfully submitted batches, oldest first.
    pub fn batches(&self) -> Vec<Vec<String>> {
        mutex_lock(&self.state, SOURCE, "batches").batches.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl CdnInvalidator for RecordingCdnInvalidator {
    async fn invalidate(&self, paths: &[String]) -> Result<(), CdnError> {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate");
        if std::mem::take(&mut state.fail_next) {
            return Err(CdnError::new("injected failure"));
        }
        state.batches.push(paths.to_vec());
        Ok(())
    }
}
