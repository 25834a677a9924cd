use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".product_main h1").unwrap());
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".product_main p.price_color").unwrap());
static RATING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".product_main p.star-rating").unwrap());
static DESC_MARKER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#product_description").unwrap());
static INFO_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.table-striped tr").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static BREADCRUMB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.breadcrumb li a").unwrap());

/// Raw field values pulled from one detail page, before normalization.
/// Every field is optional here; the normalizer decides what is fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBook {
    pub title: Option<String>,
    pub price: Option<String>,
    /// Last token of the star-rating element's class attribute, e.g. "Three".
    pub rating_word: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Extract raw fields from a detail page. Pure: no network or storage
/// access, all fallback resolution happens here.
pub fn extract(html: &str) -> RawBook {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, &TITLE);
    let price = first_text(&doc, &PRICE);

    let rating_word = doc
        .select(&RATING)
        .next()
        .and_then(|el| el.value().attr("class"))
        .and_then(|class| class.split_whitespace().last())
        .map(str::to_string);

    let description = description_after_marker(&doc);
    let upc = table_value(&doc, "UPC");

    // Product information table is the weak category source; a breadcrumb
    // with at least 3 entries (root, section, category, title) always wins,
    // even over a conflicting table value.
    let mut category = table_value(&doc, "Product Type");
    let crumbs: Vec<String> = doc
        .select(&BREADCRUMB)
        .filter_map(|a| non_empty(a.text().collect::<String>()))
        .collect();
    if crumbs.len() >= 3 {
        category = Some(crumbs[2].clone());
    }

    RawBook {
        title,
        price,
        rating_word,
        upc,
        category,
        description,
    }
}

/// First `<p>` element sibling following the description marker, matching
/// the source site's layout where the blurb sits next to (not inside) the
/// marker element.
fn description_after_marker(doc: &Html) -> Option<String> {
    let marker = doc.select(&DESC_MARKER).next()?;
    marker
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .and_then(|el| non_empty(el.text().collect::<String>()))
}

fn table_value(doc: &Html, key: &str) -> Option<String> {
    doc.select(&INFO_ROW).find_map(|row| {
        let header = row.select(&TH).next()?.text().collect::<String>();
        if header.trim() != key {
            return None;
        }
        row.select(&TD)
            .next()
            .and_then(|td| non_empty(td.text().collect::<String>()))
    })
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| non_empty(el.text().collect::<String>()))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Tests ──
