//! Options for connecting to an amoCRM account.

use crate::api::{ApiError, Client, Credentials, HttpTransport};
use anyhow::Error;
use clap::Args;
use surf::Url;

/// amoCRM connection options.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// The subdomain of the account, as in `https://<domain>.amocrm.ru`.
    #[clap(long = "amocrm-domain", env = "AMOCRM_DOMAIN", default_value = "")]
    pub domain: String,

    /// Login of the API user.
    #[clap(long = "amocrm-login", env = "AMOCRM_LOGIN")]
    pub login: String,

    /// API key of the user.
    #[clap(long = "amocrm-hash", env = "AMOCRM_HASH")]
    pub hash: String,

    /// URL of the API server, overriding the URL derived from `domain`.
    ///
    /// This is mainly useful for connecting to a mock server.
    #[clap(long = "amocrm-url", env = "AMOCRM_URL")]
    pub url: Option<Url>,
}

impl Options {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            login: self.login.clone(),
            hash: self.hash.clone(),
        }
    }

    /// Create a client, without checking the credentials.
    pub fn client(&self) -> Result<Client, Error> {
        let transport = match &self.url {
            Some(url) => HttpTransport::new(url.clone())?,
            None if !self.domain.is_empty() => HttpTransport::for_domain(&self.domain)?,
            None => {
                return Err(Error::msg(
                    "either an amoCRM domain or an API URL is required",
                ))
            }
        };
        Ok(Client::new(transport, self.credentials()))
    }

    /// Create a client and make sure the credentials are accepted.
    pub async fn connect(&self) -> Result<Client, Error> {
        let client = self.client()?;
        if !client.auth().await? {
            return Err(ApiError::Unauthorized.into());
        }
        tracing::info!(login = %self.login, "connected to amoCRM");
        Ok(client)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        amocrm: Options,
    }

    #[test]
    fn test_parse() {
        let cli = Cli::try_parse_from([
            "cli",
            "--amocrm-domain",
            "example",
            "--amocrm-login",
            "user@example.com",
            "--amocrm-hash",
            "abc",
        ])
        .unwrap();
        assert_eq!(cli.amocrm.domain, "example");
        assert_eq!(cli.amocrm.url, None);
        assert_eq!(cli.amocrm.credentials().login, "user@example.com");
        cli.amocrm.client().unwrap();

        let cli = Cli::try_parse_from([
            "cli",
            "--amocrm-login",
            "user",
            "--amocrm-hash",
            "abc",
            "--amocrm-url",
            "http://localhost:8080",
        ])
        .unwrap();
        assert_eq!(
            cli.amocrm.url,
            Some("http://localhost:8080".parse().unwrap())
        );
        cli.amocrm.client().unwrap();
    }

    #[test]
    fn test_missing_server() {
        let opt = Options {
            domain: String::new(),
            login: "user".into(),
            hash: "abc".into(),
            url: None,
        };
        assert!(opt.client().is_err());
    }
}
