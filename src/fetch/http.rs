use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use url::Url;

use super::Fetcher;
use crate::config::FetchConfig;
use crate::models::FetchTask;
use crate::utils::error::FetchError;
use crate::Result;

/// Fetches listing JSON for one source unit and day over HTTP.
pub struct HttpFetcher {
    client: Client,
    url_template: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url_template: config.url_template.clone(),
        })
    }

    pub fn url_for(&self, task: &FetchTask) -> std::result::Result<Url, FetchError> {
        let id = &task.source_unit_id;
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(FetchError::Malformed(format!("invalid source id {:?}", id)));
        }

        let raw = self
            .url_template
            .replace("{source}", id)
            .replace("{date}", &task.time_window.format("%Y-%m-%d").to_string());

        Url::parse(&raw).map_err(|e| FetchError::Malformed(format!("{}: {}", raw, e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, task: &FetchTask) -> std::result::Result<String, FetchError> {
        let url = self.url_for(task)?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}
