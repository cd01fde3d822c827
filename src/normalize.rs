//! Maps whatever quote JSON the platform returned onto [`NormalizedQuote`].
//!
//! Every field is looked up through an ordered alias list; the first key
//! holding a usable value wins. Missing or malformed data never fails, it
//! falls back to a fixed default.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::money::format_quantity;
use crate::resolver::QuoteMatch;
use crate::upstream::truncate_chars;

pub const NUMBER_PLACEHOLDER: &str = "-";
pub const ITEM_NAME_DEFAULT: &str = "Rad";
pub const NOTES_MAX_CHARS: usize = 650;

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|key| key.to_string()).collect()
}

/// Lookup keys per logical field, most current naming first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aliases {
    pub number: Vec<String>,
    pub date: Vec<String>,
    pub valid_until: Vec<String>,
    pub customer: Vec<String>,
    pub customer_name: Vec<String>,
    pub customer_email: Vec<String>,
    pub customer_phone: Vec<String>,
    pub flat_customer_name: Vec<String>,
    pub flat_customer_email: Vec<String>,
    pub flat_customer_phone: Vec<String>,
    pub items: Vec<String>,
    pub item_name: Vec<String>,
    pub quantity: Vec<String>,
    pub unit: Vec<String>,
    pub unit_price: Vec<String>,
    pub item_total: Vec<String>,
    pub description: Vec<String>,
    pub subtotal: Vec<String>,
    pub vat: Vec<String>,
    pub total: Vec<String>,
    pub notes: Vec<String>,
}

impl Default for Aliases {
    fn default() -> Self {
        Self {
            number: keys(&["number", "quoteNumber", "quote_number", "id"]),
            date: keys(&["date", "createdAt", "created_at", "created_date"]),
            valid_until: keys(&["validUntil", "valid_until", "expiresAt", "expires_at"]),
            customer: keys(&["customer", "client", "account"]),
            customer_name: keys(&["name", "fullName", "full_name", "company"]),
            customer_email: keys(&["email", "mail"]),
            customer_phone: keys(&["phone", "phoneNumber", "phone_number", "tel"]),
            flat_customer_name: keys(&["customerName", "customer_name"]),
            flat_customer_email: keys(&["customerEmail", "customer_email"]),
            flat_customer_phone: keys(&["customerPhone", "customer_phone"]),
            items: keys(&["items", "lines", "lineItems", "line_items"]),
            item_name: keys(&["name", "title", "product", "product_name"]),
            quantity: keys(&["quantity", "qty", "antal"]),
            unit: keys(&["unit"]),
            unit_price: keys(&["unitPrice", "unit_price", "price"]),
            item_total: keys(&["total", "lineTotal", "line_total", "sum"]),
            description: keys(&["description", "details"]),
            subtotal: keys(&["subtotal", "subTotal", "sub_total"]),
            vat: keys(&["vat", "tax", "moms", "vatAmount"]),
            total: keys(&["total", "grandTotal", "totalAmount"]),
            notes: keys(&["notes", "note", "message", "comment"]),
        }
    }
}

impl Aliases {
    /// Extra item-list and price keys are tried before the built-in ones.
    pub fn with_overrides(mut self, item_keys: &[String], price_keys: &[String]) -> Self {
        prepend(&mut self.items, item_keys);
        prepend(&mut self.unit_price, price_keys);
        self
    }
}

fn prepend(target: &mut Vec<String>, extra: &[String]) {
    let mut merged: Vec<String> = extra.to_vec();
    merged.extend(target.drain(..).filter(|key| !extra.contains(key)));
    *target = merged;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: Option<String>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedQuote {
    pub number: String,
    pub date: String,
    pub valid_until: Option<String>,
    pub customer_lines: Vec<String>,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub vat: f64,
    pub total: f64,
    pub notes: String,
    /// False when nothing was resolved upstream and every field is a default.
    pub found: bool,
}

impl NormalizedQuote {
    pub fn has_number(&self) -> bool {
        self.number != NUMBER_PLACEHOLDER
    }
}

pub fn normalize(found: Option<&QuoteMatch>, aliases: &Aliases) -> NormalizedQuote {
    normalize_with(found.map(|m| &m.quote), aliases, Utc::now().date_naive())
}

pub fn normalize_with(data: Option<&Value>, aliases: &Aliases, today: NaiveDate) -> NormalizedQuote {
    let empty = Map::new();
    let quote = data.and_then(Value::as_object);
    let found = quote.is_some();
    let quote = quote.unwrap_or(&empty);

    let items: Vec<LineItem> = pick_array(quote, &aliases.items)
        .map(|rows| rows.iter().map(|row| line_item(row, aliases)).collect())
        .unwrap_or_default();

    let subtotal = pick(quote, &aliases.subtotal)
        .map(coerce_number)
        .unwrap_or_else(|| items.iter().fold(0.0, |sum, item| sum + item.total.unwrap_or(0.0)));
    let vat = pick(quote, &aliases.vat).map(coerce_number).unwrap_or(0.0);
    let total = pick(quote, &aliases.total)
        .map(coerce_number)
        .unwrap_or(subtotal + vat);

    NormalizedQuote {
        number: pick_text(quote, &aliases.number).unwrap_or_else(|| NUMBER_PLACEHOLDER.to_string()),
        date: pick_text(quote, &aliases.date)
            .map(|raw| display_date(&raw))
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        valid_until: pick_text(quote, &aliases.valid_until).map(|raw| display_date(&raw)),
        customer_lines: customer_lines(quote, aliases),
        items,
        subtotal,
        vat,
        total,
        notes: pick_text(quote, &aliases.notes)
            .map(|notes| truncate_notes(&notes))
            .unwrap_or_default(),
        found,
    }
}

fn line_item(row: &Value, aliases: &Aliases) -> LineItem {
    let empty = Map::new();
    let row = row.as_object().unwrap_or(&empty);

    let quantity = pick(row, &aliases.quantity);
    let unit_price = pick(row, &aliases.unit_price).map(coerce_number);
    let total = match pick(row, &aliases.item_total) {
        Some(value) => Some(coerce_number(value)),
        None if quantity.is_some() || unit_price.is_some() => {
            Some(quantity.map(coerce_number).unwrap_or(0.0) * unit_price.unwrap_or(0.0))
        }
        None => None,
    };

    let quantity = quantity.and_then(quantity_text).map(|qty| {
        match pick_text(row, &aliases.unit) {
            Some(unit) => format!("x{qty} {unit}"),
            None => format!("x{qty}"),
        }
    });

    LineItem {
        name: pick_text(row, &aliases.item_name).unwrap_or_else(|| ITEM_NAME_DEFAULT.to_string()),
        quantity,
        unit_price,
        total,
        description: pick_text(row, &aliases.description),
    }
}

fn customer_lines(quote: &Map<String, Value>, aliases: &Aliases) -> Vec<String> {
    let fields = match pick_object(quote, &aliases.customer) {
        Some(customer) => [
            pick_text(customer, &aliases.customer_name),
            pick_text(customer, &aliases.customer_email),
            pick_text(customer, &aliases.customer_phone),
        ],
        None => [
            pick_text(quote, &aliases.flat_customer_name),
            pick_text(quote, &aliases.flat_customer_email),
            pick_text(quote, &aliases.flat_customer_phone),
        ],
    };
    // A bare string under `customer` is taken as the name.
    let fallback_name = aliases
        .customer
        .iter()
        .filter_map(|key| quote.get(key))
        .find_map(scalar_text);

    let mut lines: Vec<String> = fields.into_iter().flatten().collect();
    if lines.is_empty() {
        lines.extend(fallback_name);
    }
    lines
}

/// First alias present with a non-null value.
pub fn pick<'a>(object: &'a Map<String, Value>, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|value| !value.is_null())
}

/// First alias holding an array; aliases with other shapes are skipped.
pub fn pick_array<'a>(object: &'a Map<String, Value>, keys: &[String]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|key| object.get(key).and_then(Value::as_array))
}

pub fn pick_object<'a>(object: &'a Map<String, Value>, keys: &[String]) -> Option<&'a Map<String, Value>> {
    keys.iter().find_map(|key| object.get(key).and_then(Value::as_object))
}

fn pick_text(object: &Map<String, Value>, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn quantity_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number.as_f64().map(|qty| format_quantity(qty, ',')),
        other => scalar_text(other),
    }
}

/// Numbers and numeric strings (`"1 234,50"`) parse; anything else is zero.
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn display_date(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%Y-%m-%d").to_string();
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return parsed.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

fn truncate_notes(notes: &str) -> String {
    if notes.chars().count() <= NOTES_MAX_CHARS {
        return notes.to_string();
    }
    format!("{}...", truncate_chars(notes, NOTES_MAX_CHARS).trim_end())
}
