use crate::options::{Config, HeaderMapExt};
use anyhow::{Context, Result};
use http::HeaderMap;
use metafetch_lib::{ClientBuilder, DriveClient};

/// Creates a client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<DriveClient> {
    let headers = HeaderMap::from_header_pairs(&cfg.header)?;

    ClientBuilder::builder()
        .token(cfg.token.clone())
        .base_url(cfg.base_url.clone())
        .max_retries(cfg.max_retries)
        .retry_wait_time(cfg.retry_wait_time)
        .user_agent(cfg.user_agent.clone())
        .timeout(Some(cfg.timeout))
        .custom_headers(headers)
        .build()
        .client()
        .context("Failed to create request client")
}
