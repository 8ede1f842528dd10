use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use url::Url;

use super::traits::{AssetRequest, AssetResponse, Network, ResponseType};

/// Network access over HTTP.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
  origin: Url,
}

impl HttpNetwork {
  pub fn new(origin: Url) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("wordcards/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { client, origin })
  }
}

/// `Basic` when `url` shares the worker's origin, `Cors` otherwise.
pub fn response_type_for(origin: &Url, url: &Url) -> ResponseType {
  if url.origin() == origin.origin() {
    ResponseType::Basic
  } else {
    ResponseType::Cors
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
    let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
      .map_err(|e| eyre!("Invalid method {}: {}", request.method, e))?;

    let response = self
      .client
      .request(method, request.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let response_type = response_type_for(&self.origin, response.url());
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?
      .to_vec();

    Ok(AssetResponse {
      status,
      headers,
      body,
      response_type,
    })
  }
}
