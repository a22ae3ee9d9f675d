use std::sync::Arc;

use chrono::Local;

use crate::catalog::{Link, Store};
use crate::display::Dashboard;
use crate::identity::{ProductId, product_label};

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Backoff { status_code: u16, delay_ms: u64 },
    BadStatusCode(u16),
    BannedSeller,
    Captcha,
    Cloudflare,
    InStock,
    InStockWaiting,
    MaxPrice(f64),
    NoResponse,
    OutOfStock,
    RateLimit,
    RecursionLimit,
}

pub fn status_code_message(status_code: u16, link: &Link) -> String {
    match status_code {
        403 => "ACCESS DENIED (Possible rate limiting or automation detection)".into(),
        404 if link.is_placeholder() => "PLACEHOLDER URL (Product page not created yet)".into(),
        404 => "PAGE NOT FOUND".into(),
        410 => "URL PERMANENTLY REMOVED".into(),
        429 => "RATE LIMITED".into(),
        503 => "SERVICE UNAVAILABLE (Possible Cloudflare protection)".into(),
        code => format!("STATUS CODE ERROR {code}"),
    }
}

pub fn format_event(event: &StatusEvent, link: &Link, stamp: &str) -> String {
    let product = product_label(link);
    let text = match event {
        StatusEvent::InStock => {
            return format!("🚀🚨 {product} :: IN STOCK 🚨🚀 [Last update: {stamp}]");
        }
        StatusEvent::Backoff {
            status_code,
            delay_ms,
        } => format!("BACKOFF DELAY status={status_code} delay={delay_ms}"),
        StatusEvent::BadStatusCode(code) => status_code_message(*code, link),
        StatusEvent::BannedSeller => "BANNED SELLER".into(),
        StatusEvent::Captcha => "CAPTCHA".into(),
        StatusEvent::Cloudflare => "CLOUDFLARE, WAITING".into(),
        StatusEvent::InStockWaiting => "IN STOCK, WAITING".into(),
        StatusEvent::MaxPrice(price) => format!("PRICE {price}"),
        StatusEvent::NoResponse => "NO RESPONSE".into(),
        StatusEvent::OutOfStock => "OUT OF STOCK".into(),
        StatusEvent::RateLimit => "RATE LIMIT EXCEEDED".into(),
        StatusEvent::RecursionLimit => "CLOUDFLARE RETRY LIMIT REACHED, ABORT".into(),
    };
    format!("✖  {product} :: {text} [Last update: {stamp}]")
}

/// Short in-stock line for text notifications: no glyphs, no timestamp.
pub fn in_stock_sms(link: &Link) -> String {
    format!("{} :: IN STOCK", product_label(link))
}

pub fn product_in_stock(link: &Link) -> String {
    let mut out = format!("Product Page: {}", link.url);
    if let Some(cart) = &link.cart_url {
        out.push_str(&format!("\nAdd To Cart Link: {cart}"));
    }
    out
}

pub fn setup_message(message: &str, series: &str, stamp: &str) -> String {
    format!("✖  [setup ({series})] :: {message} [Last update: {stamp}]")
}

pub fn local_stamp() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

/// Formats status events with the current local time and routes them to the
/// product's dashboard row.
#[derive(Clone)]
pub struct StatusReporter {
    dashboard: Arc<Dashboard>,
    clock: fn() -> String,
}

impl StatusReporter {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self::with_clock(dashboard, local_stamp)
    }

    pub fn with_clock(dashboard: Arc<Dashboard>, clock: fn() -> String) -> Self {
        Self { dashboard, clock }
    }

    pub fn dashboard(&self) -> &Arc<Dashboard> {
        &self.dashboard
    }

    /// Returns the event text as handed to the row (without row padding).
    pub fn report(&self, store: &Store, link: &Link, event: &StatusEvent) -> String {
        let message = format_event(event, link, &(self.clock)());
        tracing::info!(store = %store.name, brand = %link.brand, model = %link.model, "{message}");
        self.dashboard.update(&ProductId::of(store, link), &message);
        message
    }

    pub fn setup(&self, message: &str, series: &str) -> String {
        setup_message(message, series, &(self.clock)())
    }
}
