use std::ops::Deref;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::ClientConfig;
use crate::error::{RbxError, Result};

/// A fully built request, ready for the wire.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl OutboundRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A response with its body already read, tagged with the request it answers.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    pub method: Method,
    pub url: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body into `T`, naming `context` in the error on shape mismatch.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| RbxError::parse(context, e))
    }
}

/// The seam between the dispatcher and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse>;
}

/// A fixed set of reusable HTTP clients.
///
/// Callers check a client out and hand it back when the guard drops; when
/// every client is in use further callers wait for one to come back.
pub struct ClientPool {
    idle: Mutex<Vec<reqwest::Client>>,
    permits: Semaphore,
    size: usize,
}

/// A checked-out client. Returned to the pool on drop.
pub struct PooledClient<'a> {
    client: reqwest::Client,
    pool: &'a ClientPool,
    _permit: SemaphorePermit<'a>,
}

impl ClientPool {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let mut clients = Vec::with_capacity(config.client_pool_size);
        for _ in 0..config.client_pool_size {
            let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
            if let Some(timeout) = config.timeout() {
                builder = builder.timeout(timeout);
            }
            clients.push(builder.build()?);
        }
        Ok(Self {
            idle: Mutex::new(clients),
            permits: Semaphore::new(config.client_pool_size),
            size: config.client_pool_size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn checkout(&self) -> Result<PooledClient<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RbxError::Io(std::io::Error::other("client pool closed")))?;
        let client = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or_else(|| RbxError::Io(std::io::Error::other("client pool exhausted")))?;
        Ok(PooledClient {
            client,
            pool: self,
            _permit: permit,
        })
    }
}

impl Deref for PooledClient<'_> {
    type Target = reqwest::Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Drop for PooledClient<'_> {
    fn drop(&mut self) {
        // `reqwest::Client` is a handle; the clone shares the same connection pool.
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.client.clone());
    }
}

/// Production transport: `reqwest` over a [`ClientPool`].
pub struct ReqwestTransport {
    pool: ClientPool,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            pool: ClientPool::new(config)?,
        })
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse> {
        let client = self.pool.checkout().await?;
        let mut builder = client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
            method: request.method,
            url: request.url,
        })
    }
}
