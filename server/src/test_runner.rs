#![cfg(test)]

//! End-to-end tests which run the mock server and talk to it over HTTP.
//!
//! These exercise the same code path a real deployment would use: the client's HTTP transport,
//! tide routing, and parameter merging in the server.

use super::Options;
use amocrm::{
    config,
    schema::{Company, Contact, Lead},
    ApiError, Model,
};
use anyhow::Error;
use async_std::task::{sleep, spawn};
use futures::future::join_all;
use portpicker::pick_unused_port;
use serde_json::{json, Value};
use std::time::Duration;
use surf::{Client, Url};

const LOGIN: &str = "user@example.com";
const HASH: &str = "secret";

/// Start a mock server with credentials, returning its base URL.
async fn start_server() -> Result<Url, Error> {
    amocrm::init_logging();

    let port = pick_unused_port().ok_or_else(|| Error::msg("no free port"))?;
    let opt = Options {
        port,
        login: Some(LOGIN.into()),
        hash: Some(HASH.into()),
        fixture: None,
    };
    spawn(async move {
        if let Err(err) = opt.serve().await {
            tracing::error!("server exited: {err}");
        }
    });

    let url: Url = format!("http://localhost:{port}").parse()?;
    wait_for_server(&http_client(&url)?).await?;
    Ok(url)
}

fn http_client(url: &Url) -> Result<Client, Error> {
    surf::Config::default()
        .set_base_url(url.clone())
        .try_into()
        .map_err(|err| Error::msg(format!("{err}")))
}

fn options(url: &Url, hash: &str) -> config::Options {
    config::Options {
        domain: String::new(),
        login: LOGIN.into(),
        hash: hash.into(),
        url: Some(url.clone()),
    }
}

async fn wait_for_server(client: &Client) -> Result<(), Error> {
    const MAX_CONNECT_RETRIES: usize = 60;

    for _ in 0..MAX_CONNECT_RETRIES {
        match client.get("/private/api/auth.php").await {
            Ok(_) => return Ok(()),
            Err(err) => {
                tracing::warn!("waiting for server to start: {err}");
                sleep(Duration::from_millis(500)).await;
            }
        }
    }

    Err(Error::msg("timed out waiting for server"))
}

#[async_std::test]
async fn test_models_over_http() -> Result<(), Error> {
    let url = start_server().await?;

    let err = options(&url, "wrong").connect().await.unwrap_err();
    assert_eq!(err.downcast_ref(), Some(&ApiError::Unauthorized));

    let client = options(&url, HASH).connect().await?;
    let leads = client.leads().all().await?;
    assert_eq!(leads.len(), 3);
    let page = client.leads().page(2, 10).await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id(), Some(3));

    // Lazy loading goes through the HTTP transport.
    let mut lead = Lead::stub(2);
    assert_eq!(
        client.resolve(&mut lead, &Lead::NAME).await?.as_deref(),
        Some("Website redesign")
    );

    // Saving a contact creates its company first.
    let mut contact = Contact::new()
        .with(&Contact::NAME, "Peter")
        .with_related(&Contact::COMPANY, Company::new().with(&Company::NAME, "Initech"));
    let id = client.save(&mut contact).await?;
    let mut saved = client.contacts().get(id).await?;
    assert_eq!(saved.record().get("company_name"), Some(&json!("Initech")));
    let company = client
        .resolve_foreign(&mut saved, &Contact::COMPANY)
        .await?
        .ok_or_else(|| Error::msg("contact has no company"))?;
    let company = client.companies().get(company.id().unwrap_or_default()).await?;
    assert_eq!(company.get(&Company::NAME)?.as_deref(), Some("Initech"));

    // Saving again with the same name updates the existing contact.
    let mut again = Contact::new()
        .with(&Contact::NAME, "Peter")
        .with(&Contact::CREATED_USER, 101u64);
    assert_eq!(client.save(&mut again).await?, id);
    assert_eq!(
        client.contacts().get(id).await?.get(&Contact::CREATED_USER)?,
        Some(101)
    );

    Ok(())
}

#[async_std::test]
async fn test_raw_endpoints() -> Result<(), Error> {
    let url = start_server().await?;
    let http = http_client(&url)?;
    let creds = format!("USER_LOGIN={LOGIN}&USER_HASH={HASH}");

    let requests = [
        // Credentials are checked by the auth endpoint.
        (
            format!("/private/api/auth.php?type=json&{creds}"),
            json!({"auth": true}),
        ),
        (
            "/private/api/auth.php?type=json&USER_LOGIN=x&USER_HASH=y".to_string(),
            json!({"auth": false}),
        ),
        // ...and by every other endpoint.
        (
            "/private/api/v2/json/leads/list".to_string(),
            json!({"status": "error", "auth": false}),
        ),
        (
            format!("/private/api/v2/json/widgets/list?{creds}"),
            json!({"status": "error"}),
        ),
        (
            format!("/private/api/v2/json/leads/list?limit_rows=x&{creds}"),
            json!({"status": "error"}),
        ),
    ];
    let responses = join_all(requests.iter().map(|(path, _)| {
        let http = http.clone();
        async move {
            http.get(path)
                .recv_json::<Value>()
                .await
                .map_err(|err| Error::msg(format!("{path}: {err}")))
        }
    }))
    .await;
    for ((path, expected), actual) in requests.iter().zip(responses) {
        assert_eq!(&actual?, expected, "{path}");
    }

    let account: Value = http
        .get(format!("/private/api/v2/json/accounts/current?{creds}"))
        .recv_json()
        .await
        .map_err(Error::msg)?;
    assert_eq!(account["response"]["accounts"]["subdomain"], json!("example"));

    // Parameters can be given in a JSON body as well as in the query string.
    let res: Value = http
        .post(format!("/private/api/v2/json/company/set?{creds}"))
        .body_json(&json!({"request": {"company": {"add": {"name": "Initech"}}}}))
        .map_err(Error::msg)?
        .recv_json()
        .await
        .map_err(Error::msg)?;
    assert_eq!(
        res,
        json!({"response": {"company": {"add": {"id": 3, "request_id": 1}}}})
    );

    let res: Value = http
        .post("/private/api/v2/json/contacts/list")
        .body_json(&json!({
            "USER_LOGIN": LOGIN,
            "USER_HASH": HASH,
            "query": {"company_name": "Globex"},
        }))
        .map_err(Error::msg)?
        .recv_json()
        .await
        .map_err(Error::msg)?;
    assert_eq!(res["response"]["contacts"][0]["name"], json!("Jane Doe"));

    Ok(())
}
