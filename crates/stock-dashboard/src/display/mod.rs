//! In-place terminal status dashboard.
//!
//! Every monitored product owns one screen row for the lifetime of the
//! process. [`Dashboard::initialize`] lays the rows out once (stores sorted by
//! name, products in catalog order, one `[store]` header per store) and
//! [`Dashboard::update`] rewrites a single row without touching the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::{Link, Product};
use crate::error::{Error, Result};
use crate::identity::{ProductId, product_label};

mod sink;

pub use sink::{RowSink, TerminalSink};

pub fn header_line(store_name: &str) -> String {
    format!("[{}]", store_name.to_lowercase())
}

pub fn placeholder_line(link: &Link) -> String {
    format!("  ✖  {} :: INITIALIZING...", product_label(link))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Header { store: String },
    Product { id: ProductId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRow {
    /// 1-based screen row.
    pub row: u16,
    pub kind: RowKind,
    pub text: String,
}

/// Row assignment for a full catalog, before anything is drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub rows: Vec<PlannedRow>,
}

impl Layout {
    pub fn plan(products: &[Product]) -> Result<Self> {
        let mut groups: BTreeMap<&str, Vec<&Link>> = BTreeMap::new();
        for p in products {
            groups.entry(p.store.name.as_str()).or_default().push(&p.link);
        }

        let mut rows = Vec::with_capacity(groups.len() + products.len());
        let mut seen: HashMap<ProductId, u16> = HashMap::new();
        let mut next: u16 = 1;
        let mut take_row = || -> Result<u16> {
            let row = next;
            next = next
                .checked_add(1)
                .ok_or_else(|| Error::msg("catalog has more products than terminal rows"))?;
            Ok(row)
        };

        for (store, links) in groups {
            rows.push(PlannedRow {
                row: take_row()?,
                kind: RowKind::Header {
                    store: store.to_string(),
                },
                text: header_line(store),
            });
            for link in links {
                let id = ProductId::new(store, &link.brand, &link.model);
                if let Some(first) = seen.get(&id) {
                    tracing::warn!(product = %id, row = first, "duplicate product in catalog; keeping first row");
                    continue;
                }
                let row = take_row()?;
                seen.insert(id.clone(), row);
                rows.push(PlannedRow {
                    row,
                    kind: RowKind::Product { id },
                    text: placeholder_line(link),
                });
            }
        }

        Ok(Self { rows })
    }

    pub fn total_rows(&self) -> u16 {
        self.rows.last().map(|r| r.row).unwrap_or(0)
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.text.clone()).collect()
    }
}

#[derive(Debug)]
struct RowSlot {
    row: u16,
    // Held across the terminal write so one row's sequences never interleave.
    message: Mutex<String>,
}

#[derive(Debug, Default)]
pub struct DisplayState {
    initialized: bool,
    rows: HashMap<ProductId, Arc<RowSlot>>,
    total_rows: u16,
}

impl DisplayState {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn total_rows(&self) -> u16 {
        self.total_rows
    }

    pub fn row_of(&self, id: &ProductId) -> Option<u16> {
        self.rows.get(id).map(|slot| slot.row)
    }

    pub fn message_of(&self, id: &ProductId) -> Option<String> {
        let slot = self.rows.get(id)?;
        let msg = slot.message.lock().unwrap_or_else(PoisonError::into_inner);
        Some(msg.clone())
    }
}

pub struct Dashboard {
    sink: Arc<dyn RowSink>,
    state: Mutex<DisplayState>,
}

impl Dashboard {
    pub fn new(sink: Arc<dyn RowSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(DisplayState::default()),
        }
    }

    /// Draw the initial screen and register every product row.
    ///
    /// Returns `Ok(false)` when the dashboard was already initialized. The
    /// state lock is held for the whole pass, so concurrent callers and early
    /// updates wait until the screen is fully drawn.
    pub fn initialize(&self, products: &[Product]) -> Result<bool> {
        let mut state = self.lock_state();
        if state.initialized {
            tracing::debug!("dashboard already initialized");
            return Ok(false);
        }

        let layout = Layout::plan(products)?;
        self.sink.render(&layout.lines())?;

        for planned in layout.rows.iter() {
            if let RowKind::Product { id } = &planned.kind {
                state.rows.insert(
                    id.clone(),
                    Arc::new(RowSlot {
                        row: planned.row,
                        message: Mutex::new(planned.text.clone()),
                    }),
                );
            }
        }
        state.total_rows = layout.total_rows();
        state.initialized = true;

        tracing::info!(
            products = state.rows.len(),
            rows = state.total_rows,
            "dashboard initialized"
        );
        Ok(true)
    }

    /// Rewrite the row of `id` with `body` (prefixed by two spaces) and return
    /// the formatted row text. Unknown products leave the screen untouched.
    pub fn update(&self, id: &ProductId, body: &str) -> String {
        let text = format!("  {body}");

        let slot = self.lock_state().rows.get(id).cloned();
        let Some(slot) = slot else {
            tracing::debug!(product = %id, "status for unregistered product ignored");
            return text;
        };

        let mut message = slot.message.lock().unwrap_or_else(PoisonError::into_inner);
        message.clone_from(&text);
        if let Err(e) = self.sink.update_row(slot.row, &message) {
            tracing::warn!(product = %id, row = slot.row, error = %e, "failed to write status row");
        }
        text
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().is_initialized()
    }

    pub fn total_rows(&self) -> u16 {
        self.lock_state().total_rows()
    }

    pub fn row_of(&self, id: &ProductId) -> Option<u16> {
        self.lock_state().row_of(id)
    }

    pub fn message_of(&self, id: &ProductId) -> Option<String> {
        self.lock_state().message_of(id)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Store;

    #[derive(Default)]
    struct Recorder {
        renders: Mutex<Vec<Vec<String>>>,
        updates: Mutex<Vec<(u16, String)>>,
    }

    impl RowSink for Recorder {
        fn render(&self, lines: &[String]) -> std::io::Result<()> {
            self.renders.lock().unwrap().push(lines.to_vec());
            Ok(())
        }

        fn update_row(&self, row: u16, text: &str) -> std::io::Result<()> {
            self.updates.lock().unwrap().push((row, text.to_string()));
            Ok(())
        }
    }

    fn product(store: &str, brand: &str, model: &str) -> Product {
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
                series: format!("{brand}-series"),
                url: "https://example.invalid".into(),
                cart_url: None,
                max_price: None,
            },
        }
    }

    #[test]
    fn stores_sorted_products_keep_input_order() {
        let layout = Layout::plan(&[
            product("Zeta", "b", "two"),
            product("alpha", "x", "one"),
            product("Zeta", "a", "one"),
        ])
        .unwrap();

        // Byte order: uppercase sorts before lowercase.
        let texts: Vec<&str> = layout.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "[zeta]",
                "  ✖  [b (b-series)] two :: INITIALIZING...",
                "  ✖  [a (a-series)] one :: INITIALIZING...",
                "[alpha]",
                "  ✖  [x (x-series)] one :: INITIALIZING...",
            ]
        );
        let rows: Vec<u16> = layout.rows.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4, 5]);
        assert_eq!(layout.total_rows(), 5);
    }

    #[test]
    fn duplicate_identity_keeps_first_row() {
        let products = [
            product("s", "b", "m"),
            product("s", "b", "m"),
            product("s", "b", "n"),
        ];
        let layout = Layout::plan(&products).unwrap();
        let rows: Vec<(u16, &str)> = layout.rows.iter().map(|r| (r.row, r.text.as_str())).collect();
        assert_eq!(
            rows,
            vec![
                (1, "[s]"),
                (2, "  ✖  [b (b-series)] m :: INITIALIZING..."),
                (3, "  ✖  [b (b-series)] n :: INITIALIZING..."),
            ]
        );

        let rec = Arc::new(Recorder::default());
        let dash = Dashboard::new(rec.clone());
        dash.initialize(&products).unwrap();
        let id = ProductId::new("s", "b", "m");
        assert_eq!(dash.row_of(&id), Some(2));
        let text = dash.update(&id, "OUT OF STOCK");
        assert_eq!(rec.updates.lock().unwrap().as_slice(), &[(2, text)]);
    }

    #[test]
    fn empty_catalog_draws_empty_screen() {
        let rec = Arc::new(Recorder::default());
        let dash = Dashboard::new(rec.clone());
        assert!(dash.initialize(&[]).unwrap());
        assert_eq!(dash.total_rows(), 0);
        assert_eq!(rec.renders.lock().unwrap().as_slice(), &[Vec::<String>::new()]);
    }

    #[test]
    fn update_before_initialize_is_ignored() {
        let rec = Arc::new(Recorder::default());
        let dash = Dashboard::new(rec.clone());
        let id = ProductId::new("s", "b", "m");
        assert_eq!(dash.update(&id, "OUT OF STOCK"), "  OUT OF STOCK");
        assert!(rec.updates.lock().unwrap().is_empty());
        assert!(!dash.is_initialized());
    }

    #[test]
    fn update_targets_assigned_row_and_stores_text() {
        let rec = Arc::new(Recorder::default());
        let dash = Dashboard::new(rec.clone());
        dash.initialize(&[product("s", "b", "m1"), product("s", "b", "m2")])
            .unwrap();

        let id = ProductId::new("s", "b", "m2");
        let text = dash.update(&id, "✖  x :: OUT OF STOCK");
        assert_eq!(text, "  ✖  x :: OUT OF STOCK");
        assert_eq!(dash.row_of(&id), Some(3));
        assert_eq!(dash.message_of(&id).as_deref(), Some(text.as_str()));
        assert_eq!(rec.updates.lock().unwrap().as_slice(), &[(3, text)]);
    }
}
