//! Synthetic quote ticks and their composite wire form.
//!
//! The provider delivers every value as `"<status>;<value>"`, with a comma as
//! decimal separator, the way locale-bound RTD servers do. Prices follow a small
//! random walk; sizes and volumes are integers; a few fields are plain text.
use rand::Rng;

use crate::model::topic::Topic;

/// Status prefix of a healthy value.
pub const STATUS_OK: &str = "OK";

/// One value published for a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Topic the value belongs to.
    pub topic: Topic,
    /// Composite value as the cell will show it.
    pub raw: String,
}

/// Kind of a quote field, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Decimal price-like value.
    Price,
    /// Integer size or volume.
    Size,
    /// Textual value such as an exchange code.
    Text,
}

impl FieldKind {
    /// Classifies `field` by name.
    pub fn of(field: &str) -> Self {
        let lower = field.to_ascii_lowercase();
        if lower == "exchange" || lower.starts_with("imb") {
            FieldKind::Text
        } else if lower.ends_with("size") || lower.contains("volume") || lower.starts_with("adv") {
            FieldKind::Size
        } else {
            FieldKind::Price
        }
    }
}

/// Next price of a random walk around `current_price`.
///
/// The change is sampled uniformly from `[-1%, +1%]` and the result is clamped
/// to stay positive.
pub fn next_price(current_price: f64) -> f64 {
    let mut rng = rand::rng();
    let change: f64 = rng.random_range(-0.01..0.01);
    (current_price * (1.0 + change)).max(0.01)
}

/// Renders the composite value of `field` given the topic's current price.
pub fn render(field: &str, price: f64) -> String {
    let value = match FieldKind::of(field) {
        FieldKind::Price => format!("{price:.2}").replace('.', ","),
        FieldKind::Size => {
            let mut rng = rand::rng();
            (100 + rng.random_range(0..5000u32)).to_string()
        }
        FieldKind::Text => "NSDQ".to_string(),
    };
    format!("{STATUS_OK};{value}")
}

impl Tick {
    /// Builds the tick of `topic` at `price`.
    pub fn new(topic: &Topic, price: f64) -> Self {
        Tick {
            topic: topic.clone(),
            raw: render(&topic.field, price),
        }
    }
}
