use std::time::Duration;

use color_eyre::{
    Result,
    eyre::{bail, eyre},
};
use log::debug;
use reqwest::{Client, StatusCode, Url};

use crate::{
    FluxError,
    request::GenerationRequest,
    service::{PollResponse, StartResponse},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Submits a generation job and returns the StartResponse
pub async fn query(
    api_base: &str,
    request: &GenerationRequest,
    api_key: &str,
    client: &Client,
) -> Result<StartResponse> {
    let resp = client
        .post(format!("{api_base}/v1/image"))
        .timeout(REQUEST_TIMEOUT)
        .header("accept", "application/json")
        .header("x-key", api_key)
        .header("content-type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|e| FluxError::submission(format!("POST request failed: {e}")))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| FluxError::submission(format!("Couldn't read response body: {e}")))?;
    debug!("Submit response {status}: {text}");

    parse_start(status, &text)
}

/// Every way a submission can fail is a [`FluxError::Submission`]
pub fn parse_start(status: StatusCode, body: &str) -> Result<StartResponse> {
    if !status.is_success() {
        bail!(FluxError::submission(format!("{status} - {body}")));
    }

    serde_json::from_str(body).map_err(|e| {
        eyre!(FluxError::submission(format!(
            "Malformed response ({e}): {body}"
        )))
    })
}

/// Where the status of `job` can be polled
pub fn status_url(api_base: &str, job: &StartResponse) -> Result<Url> {
    match &job.polling_url {
        Some(url) => Ok(Url::parse(url)?),
        None => Ok(Url::parse_with_params(
            &format!("{api_base}/v1/get_result"),
            [("id", job.id.as_str())],
        )?),
    }
}

/// Fetches the current state of a job
pub async fn get_result(url: Url, api_key: &str, client: &Client) -> Result<PollResponse> {
    let resp = client
        .get(url)
        .timeout(REQUEST_TIMEOUT)
        .header("accept", "application/json")
        .header("x-key", api_key)
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    parse_poll(status, &text)
}

/// An error status comes back as a plain report, which the poll loop retries.
/// A body that isn't a status document is a [`FluxError::Generation`].
pub fn parse_poll(status: StatusCode, body: &str) -> Result<PollResponse> {
    if !status.is_success() {
        bail!("Status request failed {}: {}", status, body);
    }

    serde_json::from_str(body).map_err(|e| {
        eyre!(FluxError::generation(format!(
            "Malformed status response ({e}): {body}"
        )))
    })
}

/// Downloads the finished image
pub async fn download(url: &str, client: &Client) -> Result<Vec<u8>> {
    let failed = |e: reqwest::Error| {
        FluxError::generation(format!("Failed to download image from {url}: {e}"))
    };

    let resp = client
        .get(url)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(failed)?;
    check_download(resp.status(), url)?;

    let bytes = resp.bytes().await.map_err(failed)?;
    Ok(bytes.to_vec())
}

pub fn check_download(status: StatusCode, url: &str) -> Result<()> {
    if !status.is_success() {
        bail!(FluxError::generation(format!(
            "Failed to download image from {url}: {status}"
        )));
    }
    Ok(())
}
