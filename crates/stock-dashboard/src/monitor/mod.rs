//! Polling loop that drives the dashboard: one worker thread per product,
//! each fetching its page, classifying the response, and reporting through
//! the [`StatusReporter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::catalog::{Link, Product, Settings, Store};
use crate::error::{Error, Result};
use crate::status::{StatusEvent, StatusReporter, product_in_stock};

mod probe;

pub use probe::{HttpProbe, PageResponse, Probe};

const CANCEL_POLL: Duration = Duration::from_millis(200);

/// Map a fetched page onto the event shown for it.
pub fn classify(store: &Store, link: &Link, resp: &PageResponse) -> StatusEvent {
    if resp.status == 429 {
        return StatusEvent::RateLimit;
    }
    if !(200..300).contains(&resp.status) {
        return StatusEvent::BadStatusCode(resp.status);
    }

    let body = resp.body.to_lowercase();
    let labels = &store.labels;
    if matches_any(&body, &labels.captcha) {
        return StatusEvent::Captcha;
    }
    let in_stock = if !labels.in_stock.is_empty() {
        matches_any(&body, &labels.in_stock)
    } else {
        !matches_any(&body, &labels.out_of_stock)
    };
    if !in_stock {
        return StatusEvent::OutOfStock;
    }

    if let Some(max) = link.max_price {
        if let Some(price) = detect_price(&resp.body, &store.currency) {
            if price > max {
                return StatusEvent::MaxPrice(price);
            }
        }
    }
    StatusEvent::InStock
}

fn matches_any(lower_body: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && lower_body.contains(&n.to_lowercase()))
}

/// First `<currency><amount>` in the page, thousands separators allowed.
pub fn detect_price(body: &str, currency: &str) -> Option<f64> {
    if currency.is_empty() {
        return None;
    }
    for (idx, _) in body.match_indices(currency) {
        let rest = body[idx + currency.len()..].trim_start();
        let digits: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .filter(|c| *c != ',')
            .collect();
        let digits = digits.trim_end_matches('.');
        if let Ok(v) = digits.parse::<f64>() {
            return Some(v);
        }
    }
    None
}

fn status_code_of(event: &StatusEvent) -> Option<u16> {
    match event {
        StatusEvent::RateLimit => Some(429),
        StatusEvent::BadStatusCode(code @ (403 | 503)) => Some(*code),
        _ => None,
    }
}

/// Exponential delay for consecutive rate-limit style responses.
#[derive(Debug, Clone)]
pub struct Backoff {
    min_ms: u64,
    max_ms: u64,
    current_ms: Option<u64>,
}

impl Backoff {
    pub fn new(settings: &Settings) -> Self {
        Self {
            min_ms: settings.backoff_min_ms,
            max_ms: settings.backoff_max_ms,
            current_ms: None,
        }
    }

    pub fn next_delay(&mut self) -> u64 {
        let next = match self.current_ms {
            None => self.min_ms,
            Some(cur) => cur.saturating_mul(2).min(self.max_ms),
        };
        self.current_ms = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current_ms = None;
    }
}

struct Shared {
    settings: Settings,
    reporter: StatusReporter,
    probe: Arc<dyn Probe>,
    cancel: Arc<AtomicBool>,
}

pub struct Monitor {
    products: Vec<Product>,
    shared: Arc<Shared>,
}

impl Monitor {
    pub fn new(
        products: Vec<Product>,
        settings: Settings,
        reporter: StatusReporter,
        probe: Arc<dyn Probe>,
    ) -> Self {
        Self {
            products,
            shared: Arc::new(Shared {
                settings,
                reporter,
                probe,
                cancel: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.cancel)
    }

    pub fn request_cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    /// Poll every product until cancelled (or exactly once with `once`).
    pub fn run(&self, once: bool) -> Result<()> {
        let mut workers = Vec::with_capacity(self.products.len());
        for product in &self.products {
            let shared = Arc::clone(&self.shared);
            let product = product.clone();
            let name = format!("poll {}/{}", product.store.name, product.link.model);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || poll_product(&shared, &product, once))?;
            workers.push((name, handle));
        }
        tracing::info!(workers = workers.len(), once, "monitor started");

        let mut failed = Vec::new();
        for (name, handle) in workers {
            if handle.join().is_err() {
                tracing::error!(worker = %name, "poll worker panicked");
                failed.push(name);
            }
        }
        if !failed.is_empty() {
            return Err(Error::msg(format!(
                "poll workers panicked: {}",
                failed.join(", ")
            )));
        }
        Ok(())
    }

    pub fn run_once(&self) -> Result<()> {
        self.run(true)
    }
}

fn poll_product(shared: &Shared, product: &Product, once: bool) {
    let Product { store, link } = product;
    let mut backoff = Backoff::new(&shared.settings);
    let mut was_in_stock = false;

    while !shared.cancel.load(Ordering::Relaxed) {
        let event = match shared.probe.fetch(link) {
            Ok(resp) => classify(store, link, &resp),
            Err(e) => {
                tracing::debug!(store = %store.name, model = %link.model, error = %e, "fetch failed");
                StatusEvent::NoResponse
            }
        };
        shared.reporter.report(store, link, &event);

        let in_stock = event == StatusEvent::InStock;
        if in_stock && !was_in_stock {
            tracing::warn!(store = %store.name, "{}", product_in_stock(link));
        }
        was_in_stock = in_stock;

        let delay_ms = match status_code_of(&event) {
            Some(status_code) => {
                let delay_ms = backoff.next_delay();
                shared.reporter.report(
                    store,
                    link,
                    &StatusEvent::Backoff {
                        status_code,
                        delay_ms,
                    },
                );
                delay_ms
            }
            None => {
                backoff.reset();
                shared.settings.interval_ms
            }
        };

        if once {
            break;
        }
        sleep_unless_cancelled(Duration::from_millis(delay_ms), &shared.cancel);
    }
}

fn sleep_unless_cancelled(total: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Labels;

    fn store(labels: Labels) -> Store {
        Store {
            name: "thewarehouse".into(),
            enabled: true,
            currency: "$".into(),
            labels,
            links: Vec::new(),
        }
    }

    fn link(max_price: Option<f64>) -> Link {
        Link {
            brand: "sony".into(),
            model: "ps5 console".into(),
            series: "sonyps5c".into(),
            url: "https://example.invalid/ps5".into(),
            cart_url: None,
            max_price,
        }
    }

    fn ok(body: &str) -> PageResponse {
        PageResponse {
            status: 200,
            body: body.into(),
        }
    }

    #[test]
    fn out_of_stock_label_matches_case_insensitively() {
        let s = store(Labels {
            out_of_stock: vec!["Sold Out".into()],
            ..Default::default()
        });
        assert_eq!(classify(&s, &link(None), &ok("<b>SOLD OUT</b>")), StatusEvent::OutOfStock);
        assert_eq!(classify(&s, &link(None), &ok("<b>add to cart</b>")), StatusEvent::InStock);
    }

    #[test]
    fn in_stock_label_wins_when_configured() {
        let s = store(Labels {
            in_stock: vec!["add to cart".into()],
            captcha: vec!["are you a robot".into()],
            ..Default::default()
        });
        assert_eq!(classify(&s, &link(None), &ok("nothing here")), StatusEvent::OutOfStock);
        assert_eq!(classify(&s, &link(None), &ok("Add To Cart")), StatusEvent::InStock);
        assert_eq!(
            classify(&s, &link(None), &ok("Are you a robot? Add to cart")),
            StatusEvent::Captcha
        );
    }

    #[test]
    fn status_codes_map_to_events() {
        let s = store(Labels::default());
        let resp = |status| PageResponse {
            status,
            body: String::new(),
        };
        assert_eq!(classify(&s, &link(None), &resp(429)), StatusEvent::RateLimit);
        assert_eq!(classify(&s, &link(None), &resp(404)), StatusEvent::BadStatusCode(404));
        assert_eq!(status_code_of(&StatusEvent::BadStatusCode(503)), Some(503));
        assert_eq!(status_code_of(&StatusEvent::BadStatusCode(404)), None);
    }

    #[test]
    fn price_above_max_reported() {
        let s = store(Labels::default());
        let body = "<span class=price>$1,199.00</span>";
        assert_eq!(detect_price(body, "$"), Some(1199.0));
        assert_eq!(classify(&s, &link(Some(799.0)), &ok(body)), StatusEvent::MaxPrice(1199.0));
        assert_eq!(classify(&s, &link(Some(1500.0)), &ok(body)), StatusEvent::InStock);
        assert_eq!(detect_price("no price", "$"), None);
    }

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let mut b = Backoff::new(&Settings {
            backoff_min_ms: 100,
            backoff_max_ms: 350,
            ..Default::default()
        });
        assert_eq!(b.next_delay(), 100);
        assert_eq!(b.next_delay(), 200);
        assert_eq!(b.next_delay(), 350);
        assert_eq!(b.next_delay(), 350);
        b.reset();
        assert_eq!(b.next_delay(), 100);
    }
}
