use crate::{
    FluxError,
    request::GenerationRequest,
    service::{FluxService, PollResponse, ServiceFuture, StartResponse},
};

pub mod bfl_api;

/// [`FluxService`] backed by the Black Forest Labs HTTP API
#[derive(Clone)]
pub struct BflClient {
    api_base: String,
    client: reqwest::Client,
}

impl BflClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

impl FluxService for BflClient {
    fn submit<'a>(
        &'a self,
        api_key: &'a str,
        request: &'a GenerationRequest,
    ) -> ServiceFuture<'a, StartResponse> {
        Box::pin(bfl_api::query(
            &self.api_base,
            request,
            api_key,
            &self.client,
        ))
    }

    fn poll<'a>(
        &'a self,
        api_key: &'a str,
        job: &'a StartResponse,
    ) -> ServiceFuture<'a, PollResponse> {
        Box::pin(async move {
            let url = bfl_api::status_url(&self.api_base, job)
                .map_err(|e| FluxError::generation(format!("Invalid status URL: {e}")))?;
            bfl_api::get_result(url, api_key, &self.client).await
        })
    }

    fn fetch_image<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, Vec<u8>> {
        Box::pin(bfl_api::download(url, &self.client))
    }
}
