//! Direct protocol driver (JSON over HTTP)

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ActionPlan, AuthMode, DriverContext, DriverFactory, Observed, SetupStep, Surface};
use crate::error::{HarnessError, HarnessResult};
use crate::state::FixtureKey;

/// Header the service reads the session token from
pub const AUTH_HEADER: &str = "X-Authorization";

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct BookBody<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(rename = "imageUrl")]
    image_url: &'a str,
    #[serde(rename = "type")]
    book_type: &'a str,
}

/// Configuration for the API driver
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub service_url: String,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:3030".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Factory for bare API clients
pub struct ApiDriver {
    config: ApiConfig,
}

impl ApiDriver {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for ApiDriver {
    fn surface(&self) -> Surface {
        Surface::Api
    }

    async fn open(&self, scenario: &str) -> HarnessResult<Box<dyn DriverContext>> {
        let client = reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| HarnessError::Setup(format!("HTTP client for '{}': {}", scenario, e)))?;

        Ok(Box::new(ApiContext {
            client,
            base_url: self.config.service_url.trim_end_matches('/').to_string(),
            timeout: self.config.request_timeout,
        }))
    }
}

struct ApiContext {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[async_trait]
impl DriverContext for ApiContext {
    async fn prepare(&mut self, _setup: &[SetupStep], _plan: &ActionPlan) -> HarnessResult<()> {
        // The token in the plan already carries the session.
        Ok(())
    }

    async fn perform(&mut self, plan: &ActionPlan) -> HarnessResult<Observed> {
        let operation = plan.operation;
        let method = operation
            .method()
            .ok_or_else(|| HarnessError::Setup(format!("{} has no protocol call", operation)))?;

        let path = if operation.needs_book_id() {
            let id = plan
                .book_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .ok_or(HarnessError::MissingFixture(FixtureKey::BookId))?;
            operation.path(Some(id))
        } else {
            operation.path(None)
        }
        .ok_or_else(|| HarnessError::Setup(format!("{} has no path", operation)))?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);

        if plan.auth == AuthMode::Session {
            let token = plan
                .token
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or(HarnessError::MissingFixture(FixtureKey::AccessToken))?;
            request = request.header(AUTH_HEADER, token);
        }

        if operation.sends_credentials() {
            let creds = plan
                .credentials
                .as_ref()
                .ok_or(HarnessError::MissingFixture(FixtureKey::Email))?;
            request = request.json(&CredentialsBody {
                email: &creds.email,
                password: &creds.password,
            });
        } else if operation.sends_book() {
            let book = plan
                .book
                .as_ref()
                .ok_or(HarnessError::MissingFixture(FixtureKey::BookTitle))?;
            request = request.json(&BookBody {
                title: &book.title,
                description: &book.description,
                image_url: &book.image_url,
                book_type: &book.book_type,
            });
        }

        debug!("{} {} ({})", method, url, operation);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HarnessError::ActionTimeout {
                    operation: operation.to_string(),
                    waited_ms: self.timeout.as_millis() as u64,
                }
            } else {
                HarnessError::Transport {
                    operation: operation.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await?;

        Ok(Observed {
            operation,
            status: status.as_u16(),
            ok: status.is_success(),
            body: Observed::decode_body(&text),
            location: None,
        })
    }

    async fn release(self: Box<Self>) -> HarnessResult<()> {
        Ok(())
    }
}
