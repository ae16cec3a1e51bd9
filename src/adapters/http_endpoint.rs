//! Reqwest-based endpoint resolver.

use async_trait::async_trait;
use reqwest::Url;

use crate::config::DashwireConfig;
use crate::error::EndpointError;
use crate::traits::{EndpointInfo, EndpointResolver};

/// Looks the socket endpoint up with `GET {api_base_url}{ws_config_path}`.
///
/// Relative or `http(s)` URLs in the response are rewritten to `ws(s)`
/// against the API host.
#[derive(Debug, Clone)]
pub struct HttpEndpointResolver {
    client: reqwest::Client,
    lookup_url: String,
    api_base_url: String,
}

impl HttpEndpointResolver {
    pub fn new(config: &DashwireConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, proxies, TLS).
    pub fn with_client(client: reqwest::Client, config: &DashwireConfig) -> Self {
        Self {
            client,
            lookup_url: config.ws_config_url(),
            api_base_url: config.api_base_url.clone(),
        }
    }

    pub fn lookup_url(&self) -> &str {
        &self.lookup_url
    }
}

#[async_trait]
impl EndpointResolver for HttpEndpointResolver {
    async fn resolve(&self) -> Result<EndpointInfo, EndpointError> {
        tracing::debug!("Looking up event socket endpoint at {}", self.lookup_url);

        let response = self
            .client
            .get(&self.lookup_url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EndpointError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        let mut info: EndpointInfo = response.json().await?;
        info.url = socket_url(&self.api_base_url, &info.url);
        Ok(info)
    }
}

/// Turn whatever the server advertised into an absolute `ws(s)://` URL.
///
/// Relative references are resolved against the API base. Text that does
/// not parse either way is passed through for the connect attempt to
/// report.
pub fn socket_url(api_base_url: &str, advertised: &str) -> String {
    let advertised = advertised.trim();
    if advertised.is_empty() {
        return String::new();
    }

    let resolved = Url::parse(advertised)
        .or_else(|_| Url::parse(api_base_url).and_then(|base| base.join(advertised)));
    let mut url = match resolved {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot resolve socket URL {:?}: {}", advertised, e);
            return advertised.to_string();
        }
    };

    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        if url.set_scheme(scheme).is_err() {
            tracing::warn!("Cannot switch {} to {}", url, scheme);
        }
    }
    url.into()
}
