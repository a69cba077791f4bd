//! Mock implementation of the amoCRM API.
//!
//! [`FakeApi`] reproduces the remote contract on top of a simple in-memory fixture. It is useful
//! for testing in isolation from the real service, either in-process through [`MockTransport`] or
//! over HTTP through the `amocrm-mock` server.

use crate::api::{Client, Credentials, Request, Transport};
use crate::fields::FieldValue;
use anyhow::Error;
use async_std::sync::{Arc, RwLock};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The fixture loaded by [`FakeApi::new`].
pub const FIXTURE: &str = include_str!("../fixtures/amocrm.json");

/// An in-memory imitation of the amoCRM API.
#[derive(Clone, Debug)]
pub struct FakeApi {
    login: Option<String>,
    hash: Option<String>,
    /// The data the API was created with, restored by [`reset`](Self::reset).
    fixture: Map<String, Value>,
    data: Map<String, Value>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    /// A mock API serving the bundled fixture.
    pub fn new() -> Self {
        match serde_json::from_str(FIXTURE) {
            Ok(Value::Object(fixture)) => Self::with_data(fixture),
            res => {
                tracing::error!("bundled fixture is malformed: {res:?}");
                Self::with_data(Map::new())
            }
        }
    }

    /// A mock API serving the fixture stored at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        match serde_json::from_slice(&bytes)? {
            Value::Object(fixture) => Ok(Self::with_data(fixture)),
            _ => Err(Error::msg(format!(
                "fixture {} must be a JSON object",
                path.display()
            ))),
        }
    }

    /// A mock API serving `fixture`, a map from resource names to lists of entities.
    pub fn with_data(fixture: Map<String, Value>) -> Self {
        Self {
            login: None,
            hash: None,
            data: fixture.clone(),
            fixture,
        }
    }

    /// Require requests to carry the given credentials.
    ///
    /// Until credentials are set, only requests without credentials are accepted.
    pub fn set_login_params(&mut self, login: impl Into<String>, hash: impl Into<String>) {
        self.login = Some(login.into());
        self.hash = Some(hash.into());
    }

    /// Discard all modifications, restoring the original fixture.
    pub fn reset(&mut self) {
        self.data = self.fixture.clone();
    }

    /// The current entities of `resource`.
    pub fn records(&self, resource: &str) -> &[Value] {
        match self.data.get(resource) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Handle a request to `method` of `resource`.
    ///
    /// `params` holds the query parameters and body fields of the request, including credentials.
    /// The method may carry an extension (`auth.php`), which is ignored.
    pub fn handle(&mut self, resource: &str, method: &str, mut params: Map<String, Value>) -> Value {
        let method = method.split('.').next().unwrap_or_default();
        tracing::debug!(resource, method, "mock API request");

        if method == "auth" {
            return json!({ "auth": self.check_auth(&mut params) });
        }
        if !self.check_auth(&mut params) {
            return json!({ "status": "error", "auth": false });
        }
        match method {
            "list" => self.list(resource, &params),
            "set" => self.set(resource, &params),
            "current" => self.current(resource),
            _ => {
                tracing::warn!(resource, method, "unsupported method");
                error()
            }
        }
    }

    /// Compare the credentials of a request with the configured ones.
    ///
    /// Missing and empty credentials are equivalent, on either side.
    fn check_auth(&self, params: &mut Map<String, Value>) -> bool {
        let login = params.remove("USER_LOGIN");
        let hash = params.remove("USER_HASH");
        credential(login.as_ref().and_then(Value::as_str)) == credential(self.login.as_deref())
            && credential(hash.as_ref().and_then(Value::as_str)) == credential(self.hash.as_deref())
    }

    fn list(&self, resource: &str, params: &Map<String, Value>) -> Value {
        let Some(Value::Array(items)) = self.data.get(resource) else {
            return error();
        };

        let mut found: Vec<&Value> = if let Some(id) = params.get("id") {
            let Ok(id) = u64::decode(id) else {
                return error();
            };
            items.iter().filter(|item| item_id(item) == Some(id)).collect()
        } else if let Some(query) = params.get("query").filter(|query| !is_blank(query)) {
            let Some(query) = embedded_object(query) else {
                return error();
            };
            items
                .iter()
                .filter(|item| {
                    query
                        .iter()
                        .all(|(key, value)| item.get(key) == Some(value))
                })
                .collect()
        } else {
            items.iter().collect()
        };

        if let Some(rows) = params.get("limit_rows") {
            let Ok(rows) = u64::decode(rows) else {
                return error();
            };
            let offset = match params.get("limit_offset").map(u64::decode) {
                None => 0,
                Some(Ok(offset)) => offset,
                Some(Err(_)) => return error(),
            };
            found = found
                .into_iter()
                .skip(offset as usize)
                .take(rows as usize)
                .collect();
        }

        respond(resource, Value::from(found.into_iter().cloned().collect::<Vec<_>>()))
    }

    fn set(&mut self, resource: &str, params: &Map<String, Value>) -> Value {
        let Some(Value::Array(items)) = self.data.get_mut(resource) else {
            return error();
        };

        // The entity is normally nested as `request.<resource>.<op>`, but a bare `<op>` parameter is
        // accepted as well.
        let request = params
            .get("request")
            .and_then(|request| request.get(resource))
            .and_then(Value::as_object)
            .unwrap_or(params);

        let mut res = Map::new();
        if let Some(update) = request.get("update") {
            let Some(mut update) = embedded_object(update) else {
                return error();
            };
            update.insert("last_modified".into(), Utc::now().timestamp().into());
            let target = update.get("id").and_then(|id| u64::decode(id).ok());
            match items.iter_mut().find(|item| target.is_some() && item_id(item) == target) {
                Some(Value::Object(existing)) => {
                    existing.extend(update);
                    res.insert("update".into(), json!({ "id": target }));
                }
                _ => tracing::info!(resource, ?target, "update target not found"),
            }
        } else if let Some(add) = request.get("add") {
            let Some(mut add) = embedded_object(add) else {
                return error();
            };
            let id = items.iter().filter_map(item_id).max().unwrap_or(0) + 1;
            add.insert("last_modified".into(), Utc::now().timestamp().into());
            add.insert("id".into(), id.into());
            items.push(Value::Object(add));
            res.insert("add".into(), json!({ "id": id, "request_id": 1 }));
        }
        respond(resource, Value::Object(res))
    }

    fn current(&self, resource: &str) -> Value {
        match self.data.get(resource) {
            Some(value) => respond(resource, value.clone()),
            None => error(),
        }
    }
}

fn credential(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn item_id(item: &Value) -> Option<u64> {
    item.get("id").and_then(|id| u64::decode(id).ok())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Interpret a parameter which may be either a JSON object or a string encoding one.
fn embedded_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj.clone()),
        Value::String(s) => match serde_json::from_str(s) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        },
        _ => None,
    }
}

fn respond(resource: &str, value: Value) -> Value {
    let mut response = Map::new();
    response.insert(resource.into(), value);
    json!({ "response": response })
}

fn error() -> Value {
    json!({ "status": "error" })
}

/// Combine the query parameters and JSON body of a request into a single set of parameters.
///
/// Fields of the body take precedence over query parameters with the same name. A body which is
/// not a JSON object is ignored.
pub fn merge_params(query: BTreeMap<String, String>, body: Option<Value>) -> Map<String, Value> {
    let mut params: Map<String, Value> = query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    if let Some(Value::Object(body)) = body {
        params.extend(body);
    }
    params
}

/// A [`Transport`] which dispatches requests directly into a [`FakeApi`].
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    api: Arc<RwLock<FakeApi>>,
    history: Arc<RwLock<Vec<Request>>>,
}

impl MockTransport {
    /// A transport for a mock API serving the bundled fixture.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api(api: FakeApi) -> Self {
        Self {
            api: Arc::new(RwLock::new(api)),
            history: Default::default(),
        }
    }

    /// A client sending requests through this transport with the given credentials.
    pub fn client(&self, login: impl Into<String>, hash: impl Into<String>) -> Client {
        Client::new(
            self.clone(),
            Credentials {
                login: login.into(),
                hash: hash.into(),
            },
        )
    }

    pub async fn set_login_params(&self, login: impl Into<String>, hash: impl Into<String>) {
        self.api.write().await.set_login_params(login, hash);
    }

    /// Restore the original fixture and forget all recorded requests.
    pub async fn reset(&self) {
        self.api.write().await.reset();
        self.history.write().await.clear();
    }

    /// All requests sent through this transport so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.history.read().await.clone()
    }

    /// The current entities of `resource`.
    pub async fn records(&self, resource: &str) -> Vec<Value> {
        self.api.read().await.records(resource).to_vec()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, req: Request) -> Result<Value, Error> {
        self.history.write().await.push(req.clone());
        let method = req.method.to_string();
        let params = merge_params(req.params, req.body);
        Ok(self.api.write().await.handle(&req.resource, &method, params))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(obj) => obj,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_check_auth() {
        let mut api = FakeApi::new();
        assert_eq!(
            api.handle("leads", "list", params(json!({"USER_LOGIN": "", "USER_HASH": ""})))
                ["response"]["leads"]
                .as_array()
                .map(Vec::len),
            Some(3)
        );
        assert_eq!(
            api.handle("api", "auth", params(json!({"USER_LOGIN": "anyone", "USER_HASH": "x"}))),
            json!({"auth": false})
        );
        assert_eq!(
            api.handle("leads", "list", params(json!({"USER_LOGIN": "anyone"}))),
            json!({"status": "error", "auth": false})
        );

        api.set_login_params("user", "hash");
        assert_eq!(
            api.handle("api", "auth.php", params(json!({"USER_LOGIN": "user", "USER_HASH": "hash"}))),
            json!({"auth": true})
        );
        assert_eq!(
            api.handle("api", "auth", params(json!({"USER_LOGIN": "user"}))),
            json!({"auth": false})
        );
        assert_eq!(
            api.handle("leads", "list", params(json!({"USER_LOGIN": "user", "USER_HASH": "x"}))),
            json!({"status": "error", "auth": false})
        );
    }

    #[test]
    fn test_list_by_id_and_query() {
        let mut api = FakeApi::new();
        let res = api.handle("contacts", "list", params(json!({"id": "2"})));
        assert_eq!(res["response"]["contacts"][0]["name"], json!("Jane Doe"));

        let res = api.handle(
            "contacts",
            "list",
            params(json!({"query": "{\"linked_company_id\": 1}"})),
        );
        let found = res["response"]["contacts"].as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("John Smith"));

        let res = api.handle("contacts", "list", params(json!({"query": {"name": "Nobody"}})));
        assert_eq!(res, json!({"response": {"contacts": []}}));

        assert_eq!(
            api.handle("contacts", "list", params(json!({"id": "abc"}))),
            json!({"status": "error"})
        );
        assert_eq!(
            api.handle("contacts", "list", params(json!({"query": "not json"}))),
            json!({"status": "error"})
        );
        assert_eq!(api.handle("widgets", "list", Map::new()), json!({"status": "error"}));
        assert_eq!(api.handle("leads", "delete", Map::new()), json!({"status": "error"}));
    }

    #[test]
    fn test_list_paging() {
        let mut api = FakeApi::new();
        let res = api.handle(
            "leads",
            "list",
            params(json!({"limit_rows": "2", "limit_offset": "1"})),
        );
        let ids = res["response"]["leads"]
            .as_array()
            .unwrap()
            .iter()
            .map(|lead| lead["id"].clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![json!(2), json!(3)]);

        let res = api.handle("leads", "list", params(json!({"limit_rows": 1})));
        assert_eq!(res["response"]["leads"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_set() {
        let mut api = FakeApi::new();
        let res = api.handle(
            "company",
            "set",
            params(json!({"request": {"company": {"add": {"name": "Initech"}}}})),
        );
        assert_eq!(
            res,
            json!({"response": {"company": {"add": {"id": 3, "request_id": 1}}}})
        );
        let added = &api.records("company")[2];
        assert_eq!(added["name"], json!("Initech"));
        assert!(added["last_modified"].is_i64());

        // Payloads may also be JSON strings, outside of the `request` envelope.
        let res = api.handle(
            "company",
            "set",
            params(json!({"update": "{\"id\": 3, \"name\": \"Initrode\"}"})),
        );
        assert_eq!(res, json!({"response": {"company": {"update": {"id": 3}}}}));
        assert_eq!(api.records("company")[2]["name"], json!("Initrode"));

        let res = api.handle(
            "company",
            "set",
            params(json!({"request": {"company": {"update": {"id": 99, "name": "x"}}}})),
        );
        assert_eq!(res, json!({"response": {"company": {}}}));

        api.reset();
        assert_eq!(api.records("company").len(), 2);
    }

    #[test]
    fn test_add_to_empty_resource() {
        let mut fixture = Map::new();
        fixture.insert("notes".into(), json!([]));
        let mut api = FakeApi::with_data(fixture);
        let res = api.handle("notes", "set", params(json!({"add": {"text": "hi"}})));
        assert_eq!(res["response"]["notes"]["add"]["id"], json!(1));
    }

    #[test]
    fn test_open() {
        let dir = std::env::temp_dir().join(format!("amocrm-fixture-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fixture.json");

        std::fs::write(&path, r#"{"leads": [{"id": 7, "name": "Imported"}]}"#).unwrap();
        let api = FakeApi::open(&path).unwrap();
        assert_eq!(api.records("leads").len(), 1);
        assert_eq!(api.records("leads")[0]["name"], json!("Imported"));
        assert!(api.records("contacts").is_empty());

        std::fs::write(&path, "[]").unwrap();
        assert!(FakeApi::open(&path).is_err());
        assert!(FakeApi::open(dir.join("missing.json")).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_current() {
        let mut api = FakeApi::new();
        let res = api.handle("accounts", "current", Map::new());
        assert_eq!(res["response"]["accounts"]["subdomain"], json!("example"));
    }

    #[test]
    fn test_merge_params() {
        let query = [("id".to_string(), "1".to_string()), ("a".to_string(), "b".to_string())]
            .into_iter()
            .collect();
        let merged = merge_params(query, Some(json!({"a": {"nested": true}})));
        assert_eq!(Value::Object(merged), json!({"id": "1", "a": {"nested": true}}));
    }

    #[async_std::test]
    async fn test_transport_history() {
        let mock = MockTransport::new();
        let client = mock.client("", "");
        client.list("leads", []).await.unwrap();
        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].resource, "leads");

        mock.reset().await;
        assert!(mock.requests().await.is_empty());
    }

    #[async_std::test]
    async fn test_transport_with_api() {
        let mut fixture = Map::new();
        fixture.insert("notes".into(), json!([{"id": 5, "text": "hello"}]));
        let mut api = FakeApi::with_data(fixture);
        api.set_login_params("user", "hash");

        let mock = MockTransport::with_api(api);
        let notes = mock.client("user", "hash").list("notes", []).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["text"], json!("hello"));
        assert!(mock.client("user", "x").list("notes", []).await.is_err());
        assert!(mock.records("leads").await.is_empty());
    }
}
