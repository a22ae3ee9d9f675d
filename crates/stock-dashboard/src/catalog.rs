//! Typed view of the monitored catalog: stores, their product links, and the
//! polling settings that drive the monitor.

use serde::{Deserialize, Serialize};

use crate::config::ConfigDoc;
use crate::error::{Error, Result};

/// URL marker used for product pages that do not exist yet.
pub const PLACEHOLDER_URL_MARKER: &str = "TBD";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Labels {
    pub in_stock: Vec<String>,
    pub out_of_stock: Vec<String>,
    pub captcha: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Link {
    pub brand: String,
    pub model: String,
    pub series: String,
    pub url: String,
    #[serde(default)]
    pub cart_url: Option<String>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

impl Link {
    pub fn is_placeholder(&self) -> bool {
        self.url.contains(PLACEHOLDER_URL_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Store {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub links: Vec<Link>,
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "$".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub interval_ms: u64,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            backoff_min_ms: 10_000,
            backoff_max_ms: 3_600_000,
            timeout_ms: 30_000,
            user_agent: concat!("stockwatch/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// One monitored item: the store it belongs to plus its link.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub store: Store,
    pub link: Link,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub stores: Vec<Store>,
    pub settings: Settings,
}

impl Catalog {
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let stores: Vec<Store> = doc.deserialize_path("stores")?.unwrap_or_default();
        let settings: Settings = doc.deserialize_path("settings")?.unwrap_or_default();

        for store in &stores {
            if store.name.trim().is_empty() {
                return Err(Error::msg(format!(
                    "store with empty name in {}",
                    doc.path.display()
                )));
            }
        }
        if settings.backoff_min_ms > settings.backoff_max_ms {
            return Err(Error::msg(format!(
                "settings.backoff_min_ms ({}) exceeds settings.backoff_max_ms ({})",
                settings.backoff_min_ms, settings.backoff_max_ms
            )));
        }

        Ok(Self { stores, settings })
    }

    pub fn enabled_stores(&self) -> impl Iterator<Item = &Store> {
        self.stores.iter().filter(|s| s.enabled)
    }

    /// Every (store, link) pair of enabled stores, in catalog order.
    pub fn products(&self) -> Vec<Product> {
        self.enabled_stores()
            .flat_map(|store| {
                store.links.iter().map(move |link| Product {
                    store: store.clone(),
                    link: link.clone(),
                })
            })
            .collect()
    }
}
