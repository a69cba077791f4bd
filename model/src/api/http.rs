//! Transport over real HTTP.

use super::{Request, Transport};
use anyhow::Error;
use async_trait::async_trait;
use serde_json::Value;
use surf::Url;

/// Sends requests to an amoCRM API server over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: surf::Client,
}

impl HttpTransport {
    /// Connect to the API server at `base_url`.
    pub fn new(base_url: Url) -> Result<Self, Error> {
        Ok(Self {
            client: surf::Config::new()
                .set_base_url(base_url)
                .try_into()
                .map_err(|err| Error::msg(format!("unable to create HTTP client: {err}")))?,
        })
    }

    /// Connect to the hosted amoCRM account `domain`.
    pub fn for_domain(domain: &str) -> Result<Self, Error> {
        Self::new(format!("https://{domain}.amocrm.ru/").parse()?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: Request) -> Result<Value, Error> {
        let path = req.path();
        let mut builder = if req.is_post() {
            self.client.post(&path)
        } else {
            self.client.get(&path)
        };
        builder = builder.query(&req.params).map_err(Error::msg)?;
        if let Some(body) = &req.body {
            builder = builder.body_json(body).map_err(Error::msg)?;
        }
        tracing::debug!(?builder, "HTTP request");
        builder.recv_json().await.map_err(Error::msg)
    }
}
