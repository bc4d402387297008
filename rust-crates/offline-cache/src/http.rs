use serde::{
    Deserialize,
    Serialize,
};
use url::Url;

/// An intercepted request. Only what the fetch policy looks at is modelled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub accept: Option<String>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self { url, accept: None }
    }

    /// A navigation request for an HTML document.
    pub fn document(url: Url) -> Self {
        Self {
            url,
            accept: Some("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8".to_string()),
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_document(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/html"))
    }

    /// Cache key: the full URL without fragment.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url, false)
    }

    /// Cache key with the query string removed as well.
    pub fn cache_key_ignoring_search(&self) -> String {
        cache_key(&self.url, true)
    }
}

pub(crate) fn cache_key(url: &Url, ignore_search: bool) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    if ignore_search {
        url.set_query(None);
    }
    url.into()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(with = "hex_body")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

mod hex_body {
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
        de::Error,
    };

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn is_document__requires_html_accept() {
        let url = Url::parse("https://coin.example/").unwrap();

        assert!(Request::document(url.clone()).is_document());
        assert!(!Request::get(url.clone()).is_document());
        assert!(!Request::get(url).with_accept("image/png").is_document());
    }

    #[test]
    fn cache_key__drops_fragment_and_optionally_query() {
        let url = Url::parse("https://coin.example/index.html?utm=1#top").unwrap();
        let request = Request::get(url);

        assert_eq!(request.cache_key(), "https://coin.example/index.html?utm=1");
        assert_eq!(request.cache_key_ignoring_search(), "https://coin.example/index.html");
    }
}
