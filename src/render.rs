//! A4 quote document: a pure layout pass producing positioned text runs,
//! then a paint pass handing them to printpdf.

use std::io::BufWriter;

use anyhow::{Context, Result, anyhow};
use printpdf::{BuiltinFont, Color, Greyscale, IndirectFontRef, Mm, PdfDocument};

use crate::money::Money;
use crate::normalize::NormalizedQuote;
use crate::upstream::truncate_chars;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN_LEFT: f32 = 50.0;
pub const TOP: f32 = 790.0;
pub const BOTTOM: f32 = 60.0;

pub const COL_NAME: f32 = MARGIN_LEFT;
pub const COL_QTY: f32 = 300.0;
pub const COL_PRICE: f32 = 370.0;
pub const COL_TOTAL: f32 = 470.0;

pub const NO_ITEMS_TEXT: &str = "Inga rader i offerten.";

const NAME_MAX_CHARS: usize = 44;
const DESCRIPTION_MAX_CHARS: usize = 90;
const WRAP_CHARS: usize = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    Black,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Title,
    Header,
    Customer,
    TableHead,
    ItemRow,
    ItemDetail,
    Placeholder,
    Totals,
    Notes,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub section: Section,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub weight: Weight,
    pub shade: Shade,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub title: String,
    pub pages: Vec<Vec<TextRun>>,
}

impl Layout {
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.pages.iter().flatten()
    }

    pub fn texts(&self, section: Section) -> Vec<&str> {
        self.runs()
            .filter(|run| run.section == section)
            .map(|run| run.text.as_str())
            .collect()
    }
}

struct Cursor {
    pages: Vec<Vec<TextRun>>,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self { pages: vec![Vec::new()], y: TOP }
    }

    /// Starts a continuation page when the next line would cross the bottom.
    fn reserve(&mut self, height: f32) {
        if self.y - height < BOTTOM {
            self.pages.push(Vec::new());
            self.y = TOP;
        }
    }

    fn put(&mut self, section: Section, x: f32, size: f32, weight: Weight, shade: Shade, text: impl Into<String>) {
        let run = TextRun { section, x, y: self.y, size, weight, shade, text: text.into() };
        if let Some(page) = self.pages.last_mut() {
            page.push(run);
        }
    }

    fn line(&mut self, section: Section, size: f32, weight: Weight, shade: Shade, text: impl Into<String>) {
        let height = size + 5.0;
        self.reserve(height);
        self.put(section, MARGIN_LEFT, size, weight, shade, text);
        self.y -= height;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }
}

pub fn layout(quote: &NormalizedQuote, token: &str, money: &Money) -> Layout {
    let mut cursor = Cursor::new();
    let title = if quote.has_number() {
        format!("Offert {}", quote.number)
    } else {
        "Offert".to_string()
    };

    cursor.line(Section::Title, 20.0, Weight::Bold, Shade::Black, title.clone());
    cursor.gap(8.0);

    cursor.line(Section::Header, 11.0, Weight::Normal, Shade::Black, format!("Offertnummer: {}", quote.number));
    cursor.line(Section::Header, 11.0, Weight::Normal, Shade::Black, format!("Datum: {}", quote.date));
    if let Some(valid_until) = &quote.valid_until {
        cursor.line(Section::Header, 11.0, Weight::Normal, Shade::Black, format!("Giltig till: {valid_until}"));
    }
    cursor.gap(10.0);

    cursor.line(Section::Customer, 12.0, Weight::Bold, Shade::Black, "Kund");
    if quote.customer_lines.is_empty() {
        cursor.line(Section::Customer, 11.0, Weight::Normal, Shade::Black, "-");
    }
    for line in &quote.customer_lines {
        cursor.line(Section::Customer, 11.0, Weight::Normal, Shade::Black, line.clone());
    }
    cursor.gap(12.0);

    if quote.items.is_empty() {
        cursor.line(Section::Placeholder, 11.0, Weight::Normal, Shade::Gray, NO_ITEMS_TEXT);
    } else {
        table(&mut cursor, quote, money);
    }
    cursor.gap(12.0);

    totals(&mut cursor, quote, money);
    cursor.gap(16.0);

    if !quote.found {
        cursor.line(Section::Fallback, 11.0, Weight::Bold, Shade::Black, format!("Ingen offertdata kunde laddas (token: {token})."));
        cursor.line(Section::Fallback, 10.0, Weight::Normal, Shade::Gray, "Ladda om sidan om en stund eller kontakta support och ange token ovan.");
    } else if !quote.notes.is_empty() {
        cursor.line(Section::Notes, 12.0, Weight::Bold, Shade::Black, "Anteckningar");
        for line in wrap(&quote.notes, WRAP_CHARS) {
            cursor.line(Section::Notes, 10.0, Weight::Normal, Shade::Black, line);
        }
    }

    Layout { title, pages: cursor.pages }
}

fn table(cursor: &mut Cursor, quote: &NormalizedQuote, money: &Money) {
    let head = [(COL_NAME, "Artikel"), (COL_QTY, "Antal"), (COL_PRICE, "A-pris"), (COL_TOTAL, "Summa")];
    cursor.reserve(15.0);
    for (x, label) in head {
        cursor.put(Section::TableHead, x, 10.0, Weight::Bold, Shade::Black, label);
    }
    cursor.gap(16.0);

    for item in &quote.items {
        cursor.reserve(15.0);
        cursor.put(Section::ItemRow, COL_NAME, 10.0, Weight::Normal, Shade::Black, truncate_display(&item.name, NAME_MAX_CHARS));
        if let Some(quantity) = &item.quantity {
            cursor.put(Section::ItemRow, COL_QTY, 10.0, Weight::Normal, Shade::Black, quantity.clone());
        }
        if let Some(unit_price) = item.unit_price {
            cursor.put(Section::ItemRow, COL_PRICE, 10.0, Weight::Normal, Shade::Black, money.format(unit_price));
        }
        if let Some(total) = item.total {
            cursor.put(Section::ItemRow, COL_TOTAL, 10.0, Weight::Normal, Shade::Black, money.format(total));
        }
        cursor.gap(15.0);

        if let Some(description) = &item.description {
            cursor.reserve(12.0);
            cursor.put(Section::ItemDetail, COL_NAME + 10.0, 9.0, Weight::Normal, Shade::Gray, truncate_display(description, DESCRIPTION_MAX_CHARS));
            cursor.gap(12.0);
        }
    }
}

fn totals(cursor: &mut Cursor, quote: &NormalizedQuote, money: &Money) {
    let rows = [
        ("Delsumma", quote.subtotal, Weight::Normal),
        ("Moms", quote.vat, Weight::Normal),
        ("Totalt", quote.total, Weight::Bold),
    ];
    for (label, amount, weight) in rows {
        cursor.reserve(16.0);
        cursor.put(Section::Totals, COL_PRICE, 11.0, weight, Shade::Black, label);
        cursor.put(Section::Totals, COL_TOTAL, 11.0, weight, Shade::Black, money.format(amount));
        cursor.gap(16.0);
    }
}

fn truncate_display(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", truncate_chars(text, max.saturating_sub(3)).trim_end())
    }
}

/// Greedy word wrap on character counts; explicit newlines are kept.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

/// Paints a finished layout with the built-in Helvetica faces.
pub fn paint(layout: &Layout) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.clone(), mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
    let regular: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| anyhow!("loading Helvetica: {error:?}"))?;
    let bold: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|error| anyhow!("loading Helvetica-Bold: {error:?}"))?;

    for (index, runs) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for run in runs {
            let grey = match run.shade {
                Shade::Black => 0.0,
                Shade::Gray => 0.45,
            };
            layer.set_fill_color(Color::Greyscale(Greyscale::new(grey, None)));
            let font = match run.weight {
                Weight::Normal => &regular,
                Weight::Bold => &bold,
            };
            layer.use_text(run.text.clone(), run.size, mm(run.x), mm(run.y), font);
        }
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|error| anyhow!("writing pdf: {error:?}"))?;
    writer.into_inner().context("flushing pdf buffer")
}

pub fn render(quote: &NormalizedQuote, token: &str, money: &Money) -> Result<Vec<u8>> {
    paint(&layout(quote, token, money))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::normalize::{Aliases, normalize_with};

    fn quote(data: Option<serde_json::Value>) -> NormalizedQuote {
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        normalize_with(data.as_ref(), &Aliases::default(), today)
    }

    #[test]
    fn sections_are_painted_top_down() {
        let quote = quote(Some(json!({
            "number": "Q-7",
            "customer": {"name": "Anna"},
            "items": [{"name": "Paint", "quantity": 2, "unitPrice": 150, "description": "Vit, matt"}],
            "notes": "Betalning inom 30 dagar."
        })));
        let layout = layout(&quote, "abc123", &Money::swedish());
        let order: Vec<Section> = layout.runs().map(|run| run.section).collect();
        let first = |section| order.iter().position(|s| *s == section).unwrap();

        assert!(first(Section::Title) < first(Section::Header));
        assert!(first(Section::Header) < first(Section::Customer));
        assert!(first(Section::Customer) < first(Section::TableHead));
        assert!(first(Section::ItemRow) < first(Section::ItemDetail));
        assert!(first(Section::ItemDetail) < first(Section::Totals));
        assert!(first(Section::Totals) < first(Section::Notes));

        let ys: Vec<f32> = layout.runs().map(|run| run.y).collect();
        assert!(ys.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(layout.texts(Section::Title), vec!["Offert Q-7"]);
        assert_eq!(layout.texts(Section::ItemRow), vec!["Paint", "x2", "150,00 kr", "300,00 kr"]);
        assert!(layout.texts(Section::Fallback).is_empty());
    }

    #[test]
    fn empty_items_show_placeholder_and_no_rows() {
        let quote = quote(Some(json!({"items": []})));
        let layout = layout(&quote, "abc123", &Money::swedish());
        assert_eq!(layout.texts(Section::Placeholder), vec![NO_ITEMS_TEXT]);
        assert!(layout.texts(Section::ItemRow).is_empty());
        assert!(layout.texts(Section::TableHead).is_empty());
    }

    #[test]
    fn missing_quote_shows_fallback_naming_token() {
        let quote = quote(None);
        let layout = layout(&quote, "quote_XYZ789", &Money::swedish());
        let fallback = layout.texts(Section::Fallback);
        assert!(fallback[0].contains("quote_XYZ789"));
        assert_eq!(layout.texts(Section::Customer), vec!["Kund", "-"]);
        assert_eq!(
            layout.texts(Section::Totals),
            vec!["Delsumma", "0,00 kr", "Moms", "0,00 kr", "Totalt", "0,00 kr"]
        );
    }

    #[test]
    fn dim_descriptions_and_bold_total() {
        let quote = quote(Some(json!({"items": [{"name": "Tile", "description": "Grå"}], "total": 10})));
        let layout = layout(&quote, "t", &Money::swedish());
        let detail = layout.runs().find(|run| run.section == Section::ItemDetail).unwrap();
        assert_eq!(detail.shade, Shade::Gray);
        let total = layout.runs().find(|run| run.text == "Totalt").unwrap();
        assert_eq!(total.weight, Weight::Bold);
    }

    #[test]
    fn long_item_lists_continue_on_new_pages() {
        let items: Vec<_> = (0..80)
            .map(|i| json!({"name": format!("Rad {i}"), "quantity": 1, "unitPrice": 10}))
            .collect();
        let quote = quote(Some(json!({ "items": items })));
        let layout = layout(&quote, "t", &Money::swedish());

        assert!(layout.pages.len() > 1);
        assert_eq!(layout.texts(Section::ItemRow).iter().filter(|t| t.starts_with("Rad ")).count(), 80);
        for page in &layout.pages {
            assert!(page.iter().all(|run| run.y >= BOTTOM && run.y <= TOP));
            assert!(page.iter().all(|run| run.x >= MARGIN_LEFT));
        }
        let continued = &layout.pages[1][0];
        assert_eq!(continued.y, TOP);
        assert_eq!(continued.x, MARGIN_LEFT);
    }

    #[test]
    fn wraps_notes_on_words() {
        let lines = wrap("ett två tre fyra\nfem", 9);
        assert_eq!(lines, vec!["ett två", "tre fyra", "fem"]);
    }

    #[test]
    fn paints_a_pdf() {
        let quote = quote(None);
        let bytes = render(&quote, "abc123", &Money::swedish()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
