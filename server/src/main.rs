use amocrm::mock::{merge_params, FakeApi};
use anyhow::Error;
use async_std::sync::{Arc, RwLock};
use clap::Parser;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tide::{http::StatusCode, Body, Request, Response};

mod test_runner;

/// Start a mock amoCRM API server.
#[derive(Clone, Debug, Parser)]
struct Options {
    /// The port where the API should be served.
    #[clap(short, long, env = "AMOCRM_MOCK_PORT", default_value = "8080")]
    port: u16,

    /// Login required from clients.
    ///
    /// If neither a login nor a hash is given, requests are accepted without credentials.
    #[clap(long, env = "AMOCRM_MOCK_LOGIN")]
    login: Option<String>,

    /// API key required from clients.
    #[clap(long, env = "AMOCRM_MOCK_HASH")]
    hash: Option<String>,

    /// JSON file with the initial data to serve, instead of the bundled fixture.
    #[clap(long, env = "AMOCRM_MOCK_FIXTURE")]
    fixture: Option<PathBuf>,
}

impl Options {
    fn api(&self) -> Result<FakeApi, Error> {
        let mut api = match &self.fixture {
            Some(path) => FakeApi::open(path)?,
            None => FakeApi::new(),
        };
        if self.login.is_some() || self.hash.is_some() {
            api.set_login_params(
                self.login.clone().unwrap_or_default(),
                self.hash.clone().unwrap_or_default(),
            );
        }
        Ok(api)
    }

    async fn serve(self) -> Result<(), Error> {
        let app = app(self.api()?);
        tracing::info!(port = self.port, "serving mock amoCRM API");
        app.listen(format!("0.0.0.0:{}", self.port)).await?;
        Ok(())
    }
}

type State = Arc<RwLock<FakeApi>>;

fn app(api: FakeApi) -> tide::Server<State> {
    let mut app = tide::with_state(Arc::new(RwLock::new(api)));
    app.at("/private/api/v2/json/:resource/:method")
        .get(dispatch)
        .post(dispatch);
    app.at("/private/api/:method").get(dispatch).post(dispatch);
    app
}

/// Handle any API request.
///
/// Parameters may be given in the query string, in a JSON body, or both.
async fn dispatch(mut req: Request<State>) -> tide::Result {
    let resource = req.param("resource").unwrap_or("api").to_string();
    let method = req.param("method")?.to_string();
    let query: BTreeMap<String, String> = req.query()?;
    let body = req.body_string().await?;
    let body: Option<Value> = if body.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(&body).map_err(|err| {
            tide::Error::from_str(StatusCode::BadRequest, format!("invalid JSON body: {err}"))
        })?)
    };

    let res = req
        .state()
        .write()
        .await
        .handle(&resource, &method, merge_params(query, body));
    Ok(Response::builder(StatusCode::Ok)
        .body(Body::from_json(&res)?)
        .build())
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    amocrm::init_logging();
    Options::parse().serve().await
}
