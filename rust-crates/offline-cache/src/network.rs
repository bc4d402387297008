use crate::http::{
    Request,
    Response,
};
use anyhow::Context;
use reqwest::header::{
    ACCEPT,
    CONTENT_TYPE,
};

pub trait Network {
    /// Resolves with any HTTP response, including non-success statuses.
    /// Errors mean the request never completed.
    fn fetch(&self, request: &Request) -> impl Future<Output = anyhow::Result<Response>>;
}

#[derive(Clone)]
pub struct ReqwestNetwork {
    http: reqwest::Client,
}

impl ReqwestNetwork {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client for offline cache")?;
        Ok(Self { http })
    }
}

impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &Request) -> anyhow::Result<Response> {
        let mut builder = self.http.get(request.url.clone());
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        let res = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = res
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {}", request.url))?;
        Ok(Response {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
