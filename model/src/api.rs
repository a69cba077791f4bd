//! Access to the amoCRM REST API.
//!
//! The API is a fixed third-party contract. Every resource (`leads`, `contacts`, ...) is exposed
//! under `/private/api/v2/json/<resource>/<method>`, where the method is one of
//! * `list`: look up entities by ID (`id`), by example (`query`, a JSON object whose fields must
//!   all match), or page through all of them (`limit_rows`, `limit_offset`)
//! * `set`: create (`add`) or update (`update`) a single entity
//! * `current`: fetch information about the current account
//!
//! Authentication is a simple comparison of the `USER_LOGIN` and `USER_HASH` parameters, which
//! are sent with every request. The endpoint `/private/api/auth.php` can be used to check them.
//!
//! The HTTP transport is abstracted behind the [`Transport`] trait, so that the same [`Client`] can
//! talk either to the real service ([`HttpTransport`]) or to an in-process mock.

use crate::fields::FieldValue;
use anyhow::Error;
use async_trait::async_trait;
use derive_more::Display;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

mod http;

pub use http::HttpTransport;

/// A resource and method in the API.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    #[display(fmt = "auth")]
    Auth,
    #[display(fmt = "list")]
    List,
    #[display(fmt = "set")]
    Set,
    #[display(fmt = "current")]
    Current,
}

/// A request to the API.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub resource: String,
    pub method: Method,
    /// URL query parameters.
    pub params: BTreeMap<String, String>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl Request {
    pub fn new(resource: impl Into<String>, method: Method) -> Self {
        Self {
            resource: resource.into(),
            method,
            params: Default::default(),
            body: None,
        }
    }

    pub fn param(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(param.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The path of the endpoint for this request, relative to the API host.
    pub fn path(&self) -> String {
        match self.method {
            Method::Auth => "private/api/auth.php".into(),
            method => format!("private/api/v2/json/{}/{method}", self.resource),
        }
    }

    /// Whether this request should be sent as a `POST`.
    pub fn is_post(&self) -> bool {
        self.body.is_some()
    }
}

/// The request/response function connecting a [`Client`] to the API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and get the parsed JSON response.
    async fn send(&self, req: Request) -> Result<Value, Error>;
}

/// Errors reported by the API.
///
/// These are wrapped in [`anyhow::Error`] and can be recovered using
/// [`downcast_ref`](anyhow::Error::downcast_ref).
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ApiError {
    /// The login or hash was rejected.
    #[display(fmt = "amoCRM authentication failed")]
    Unauthorized,
    /// The request was rejected, usually due to invalid parameters.
    #[display(fmt = "amoCRM rejected request to {}", _0)]
    Rejected(String),
    /// The requested entity does not exist.
    #[display(fmt = "{} {} not found", resource, id)]
    NotFound { resource: String, id: u64 },
    /// The response did not have the expected shape.
    #[display(fmt = "malformed amoCRM response: {}", _0)]
    Malformed(String),
}

impl std::error::Error for ApiError {}

/// Credentials for the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub hash: String,
}

/// A generic API response.
///
/// Successful responses have the form
/// ```json
/// {
///     "response": { "<resource>": ... }
/// }
/// ```
/// while failures look like `{"status": "error"}`, with `"auth": false` added if the credentials
/// were rejected.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Response {
    Ok {
        response: Map<String, Value>,
    },
    Err {
        status: String,
        #[serde(default)]
        auth: Option<bool>,
    },
}

/// Response from the `auth` endpoint.
#[derive(Clone, Debug, Deserialize)]
struct AuthResponse {
    auth: bool,
}

/// Response to a `set` request.
#[derive(Clone, Debug, Default, Deserialize)]
struct SetResponse {
    add: Option<Ack>,
    update: Option<Ack>,
}

/// Acknowledgement of a single `add` or `update`.
#[derive(Clone, Debug, Deserialize)]
struct Ack {
    id: Value,
}

impl Ack {
    fn id(&self) -> Result<u64, Error> {
        u64::decode(&self.id)
            .map_err(|_| ApiError::Malformed(format!("invalid ID {}", self.id)).into())
    }
}

/// An amoCRM client.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("login", &self.credentials.login)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client which sends requests through `transport`.
    pub fn new(transport: impl Transport + 'static, credentials: Credentials) -> Self {
        Self {
            transport: Arc::new(transport),
            credentials,
        }
    }

    /// Connect to the amoCRM account at `https://<domain>.amocrm.ru`.
    pub fn connect(domain: &str, credentials: Credentials) -> Result<Self, Error> {
        Ok(Self::new(HttpTransport::for_domain(domain)?, credentials))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn send(&self, req: Request) -> Result<Value, Error> {
        let req = req
            .param("USER_LOGIN", &self.credentials.login)
            .param("USER_HASH", &self.credentials.hash);
        tracing::info!(resource = %req.resource, method = %req.method, "amoCRM request");
        self.transport.send(req).await
    }

    /// Send a request and extract the payload for its resource from the response.
    async fn call(&self, req: Request) -> Result<Value, Error> {
        let resource = req.resource.clone();
        let endpoint = req.path();
        let res = self.send(req).await?;
        match serde_json::from_value(res)
            .map_err(|err| ApiError::Malformed(format!("{endpoint}: {err}")))?
        {
            Response::Ok { mut response } => response.remove(&resource).ok_or_else(|| {
                ApiError::Malformed(format!("{endpoint}: response has no {resource}")).into()
            }),
            Response::Err { status, auth } => {
                tracing::warn!(%endpoint, %status, ?auth, "amoCRM error");
                if auth == Some(false) {
                    Err(ApiError::Unauthorized.into())
                } else {
                    Err(ApiError::Rejected(endpoint).into())
                }
            }
        }
    }

    /// Check whether the credentials are accepted.
    pub async fn auth(&self) -> Result<bool, Error> {
        let res = self
            .send(Request::new("auth", Method::Auth).param("type", "json"))
            .await?;
        let res: AuthResponse = serde_json::from_value(res)
            .map_err(|err| ApiError::Malformed(format!("auth: {err}")))?;
        Ok(res.auth)
    }

    /// Information about the current account.
    pub async fn account(&self) -> Result<Value, Error> {
        self.call(Request::new("accounts", Method::Current)).await
    }

    /// List raw entities of `resource`.
    ///
    /// `params` are the `list` parameters: `id`, `query`, `limit_rows`, `limit_offset`.
    pub async fn list(
        &self,
        resource: &str,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Vec<Map<String, Value>>, Error> {
        let mut req = Request::new(resource, Method::List);
        for (param, value) in params {
            req = req.param(param, value);
        }
        match self.call(req).await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(obj) => Ok(obj),
                    item => Err(ApiError::Malformed(format!(
                        "{resource}: expected object, got {item}"
                    ))
                    .into()),
                })
                .collect(),
            res => Err(ApiError::Malformed(format!("{resource}: expected list, got {res}")).into()),
        }
    }

    /// Create a raw entity of `resource`, returning its ID.
    pub async fn add(&self, resource: &str, payload: Map<String, Value>) -> Result<u64, Error> {
        let res = self.set(resource, "add", payload).await?;
        res.add
            .ok_or_else(|| ApiError::Rejected(format!("{resource}/set (add)")))?
            .id()
    }

    /// Update a raw entity of `resource`, returning its ID.
    ///
    /// `payload` must include the `id` of the entity to update.
    pub async fn update(&self, resource: &str, payload: Map<String, Value>) -> Result<u64, Error> {
        let id = payload
            .get("id")
            .and_then(|id| u64::decode(id).ok())
            .ok_or_else(|| Error::msg(format!("cannot update {resource} without an ID")))?;
        let res = self.set(resource, "update", payload).await?;
        res.update
            .ok_or_else(|| ApiError::NotFound {
                resource: resource.into(),
                id,
            })?
            .id()
    }

    async fn set(
        &self,
        resource: &str,
        op: &str,
        payload: Map<String, Value>,
    ) -> Result<SetResponse, Error> {
        let mut request = Map::new();
        request.insert(op.into(), Value::Object(payload));
        let mut body = Map::new();
        body.insert(resource.into(), Value::Object(request));
        let res = self
            .call(Request::new(resource, Method::Set).body(json!({ "request": body })))
            .await?;
        Ok(serde_json::from_value(res)
            .map_err(|err| ApiError::Malformed(format!("{resource}/set: {err}")))?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockTransport;

    #[async_std::test]
    async fn test_auth() {
        let mock = MockTransport::new();
        mock.set_login_params("user", "secret").await;

        let client = mock.client("user", "secret");
        assert!(client.auth().await.unwrap());

        let client = mock.client("user", "wrong");
        assert!(!client.auth().await.unwrap());
        let err = client.list("leads", []).await.unwrap_err();
        assert_eq!(err.downcast_ref(), Some(&ApiError::Unauthorized));

        // The hash never shows up in logs.
        let debug = format!("{client:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("wrong"));
    }

    #[async_std::test]
    async fn test_auth_without_configured_credentials() {
        let mock = MockTransport::new();
        assert!(mock.client("", "").auth().await.unwrap());
        assert!(!mock.client("someone", "somehash").auth().await.unwrap());
        let err = mock
            .client("someone", "somehash")
            .list("leads", [])
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref(), Some(&ApiError::Unauthorized));
    }

    #[async_std::test]
    async fn test_list() {
        let client = MockTransport::new().client("", "");
        let leads = client.list("leads", []).await.unwrap();
        assert_eq!(leads.len(), 3);

        let leads = client
            .list("leads", [("id".into(), "2".into())])
            .await
            .unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0]["name"], json!("Website redesign"));

        let err = client.list("widgets", []).await.unwrap_err();
        assert!(matches!(err.downcast_ref(), Some(ApiError::Rejected(_))));
    }

    #[async_std::test]
    async fn test_add_and_update() {
        let client = MockTransport::new().client("", "");
        let mut payload = Map::new();
        payload.insert("name".into(), json!("New lead"));
        let id = client.add("leads", payload).await.unwrap();
        assert_eq!(id, 4);

        let mut payload = Map::new();
        payload.insert("id".into(), json!(id));
        payload.insert("price".into(), json!(300));
        assert_eq!(client.update("leads", payload).await.unwrap(), id);

        let mut payload = Map::new();
        payload.insert("id".into(), json!(1000));
        let err = client.update("leads", payload).await.unwrap_err();
        assert_eq!(
            err.downcast_ref(),
            Some(&ApiError::NotFound {
                resource: "leads".into(),
                id: 1000
            })
        );
    }

    #[async_std::test]
    async fn test_account() {
        let client = MockTransport::new().client("", "");
        let account = client.account().await.unwrap();
        assert_eq!(account["subdomain"], json!("example"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            Request::new("leads", Method::List).path(),
            "private/api/v2/json/leads/list"
        );
        assert_eq!(
            Request::new("auth", Method::Auth).path(),
            "private/api/auth.php"
        );
    }
}
