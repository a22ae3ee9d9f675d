#![allow(dead_code)]

use std::io;
use std::sync::Mutex;

use stock_dashboard::catalog::{Link, Product, Store};
use stock_dashboard::display::RowSink;

pub fn product(store: &str, brand: &str, model: &str) -> Product {
    Product {
        store: Store {
            name: store.into(),
            enabled: true,
            currency: "$".into(),
            labels: Default::default(),
            links: Vec::new(),
        },
        link: Link {
            brand: brand.into(),
            model: model.into(),
            series: format!("{brand}{model}"),
            url: format!("https://example.invalid/{store}/{model}"),
            cart_url: None,
            max_price: None,
        },
    }
}

/// In-memory terminal: a grid of rows plus a count of row writes.
#[derive(Default)]
pub struct ScreenSink {
    inner: Mutex<Screen>,
}

#[derive(Default)]
struct Screen {
    rows: Vec<String>,
    renders: usize,
    row_writes: Vec<u16>,
}

impl ScreenSink {
    pub fn rows(&self) -> Vec<String> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn renders(&self) -> usize {
        self.inner.lock().unwrap().renders
    }

    pub fn row_writes(&self) -> Vec<u16> {
        self.inner.lock().unwrap().row_writes.clone()
    }
}

impl RowSink for ScreenSink {
    fn render(&self, lines: &[String]) -> io::Result<()> {
        let mut s = self.inner.lock().unwrap();
        s.rows = lines.to_vec();
        s.renders += 1;
        Ok(())
    }

    fn update_row(&self, row: u16, text: &str) -> io::Result<()> {
        let mut s = self.inner.lock().unwrap();
        let idx = usize::from(row) - 1;
        if s.rows.len() <= idx {
            s.rows.resize(idx + 1, String::new());
        }
        s.rows[idx] = text.to_string();
        s.row_writes.push(row);
        Ok(())
    }
}
