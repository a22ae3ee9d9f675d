use std::fmt;

use crate::catalog::{Link, Store};

/// (store, brand, model) key of one dashboard row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId {
    pub store: String,
    pub brand: String,
    pub model: String,
}

impl ProductId {
    pub fn new(store: impl Into<String>, brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            brand: brand.into(),
            model: model.into(),
        }
    }

    pub fn of(store: &Store, link: &Link) -> Self {
        Self::new(&store.name, &link.brand, &link.model)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.store, self.brand, self.model)
    }
}

/// `[<brand> (<series>)] <model>`
pub fn product_label(link: &Link) -> String {
    format!("[{} ({})] {}", link.brand, link.series, link.model)
}
