use std::time::Duration;

use reqwest::blocking::Client;

use crate::catalog::{Link, Settings};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

pub trait Probe: Send + Sync {
    /// Fetch the product page. Transport failures are errors; any HTTP status
    /// is a successful fetch.
    fn fetch(&self, link: &Link) -> Result<PageResponse>;
}

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn fetch(&self, link: &Link) -> Result<PageResponse> {
        let resp = self.client.get(&link.url).send()?;
        let status = resp.status().as_u16();
        // Error pages are classified by status alone.
        let body = if resp.status().is_success() {
            resp.text()?
        } else {
            String::new()
        };
        Ok(PageResponse { status, body })
    }
}
