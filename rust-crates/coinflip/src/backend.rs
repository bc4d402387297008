use anyhow::{
    Context,
    anyhow,
};
use reqwest::{
    RequestBuilder,
    Response,
};
use std::fmt;
use url::Url;

/// Location and public key of the hosted backend shared by the auth and
/// persistence gateways.
#[derive(Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: impl Into<String>) -> anyhow::Result<Self> {
        let mut url = Url::parse(url).with_context(|| format!("invalid backend url '{url}'"))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            url,
            anon_key: anon_key.into(),
        })
    }

    pub fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid endpoint path '{path}'"))
    }

    /// Adds the project key and the caller's bearer token.
    pub(crate) fn authorize(&self, request: RequestBuilder, bearer: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

pub(crate) fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client for backend")
}

/// Turns a non-success response into an error carrying the body.
pub(crate) async fn ensure_success(res: Response, what: &str) -> anyhow::Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable body>".to_string());
    Err(anyhow!("backend responded with {status} when {what}: {body}"))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn endpoint__joins_below_project_path() {
        let config = BackendConfig::new("https://example.supabase.co/base", "key").unwrap();

        let url = config.endpoint("/rest/v1/flip_history").unwrap();

        assert_eq!(url.as_str(), "https://example.supabase.co/base/rest/v1/flip_history");
    }

    #[test]
    fn debug__redacts_anon_key() {
        let config = BackendConfig::new("https://example.supabase.co", "anon-secret").unwrap();

        assert!(!format!("{config:?}").contains("anon-secret"));
    }
}
