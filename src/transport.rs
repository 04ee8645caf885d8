use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, Method};

use crate::error::{AppError, Result};

// Create a static client to reuse connections
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub type Headers = [(String, String)];

/// The three verbs the gist synchronizer needs.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse>;
    async fn post(&self, url: &str, headers: &Headers, body: String) -> Result<HttpResponse>;
    async fn patch(&self, url: &str, headers: &Headers, body: String) -> Result<HttpResponse>;
}

#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn send(&self, method: Method, url: &str, headers: &Headers, body: Option<String>) -> Result<HttpResponse> {
        let mut request = CLIENT.request(method.clone(), url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let call = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, AppError>(HttpResponse { status, body })
        };

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AppError::Timeout(limit.as_secs()))??,
            None => call.await?,
        };

        tracing::debug!("{} {} -> {}", method, url, response.status);
        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse> {
        self.send(Method::GET, url, headers, None).await
    }

    async fn post(&self, url: &str, headers: &Headers, body: String) -> Result<HttpResponse> {
        self.send(Method::POST, url, headers, Some(body)).await
    }

    async fn patch(&self, url: &str, headers: &Headers, body: String) -> Result<HttpResponse> {
        self.send(Method::PATCH, url, headers, Some(body)).await
    }
}
