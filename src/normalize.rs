use std::sync::LazyLock;

use regex::Regex;

use crate::db::Book;
use crate::error::RecordError;
use crate::parse::detail::RawBook;

/// Optional currency symbol followed by a plain decimal. Anything else is a
/// malformed price.
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[£$€]?([0-9]+(?:\.[0-9]+)?)$").unwrap());

const RATING_WORDS: &[(&str, u8)] = &[
    ("One", 1),
    ("Two", 2),
    ("Three", 3),
    ("Four", 4),
    ("Five", 5),
];

/// Turn a raw field map into a typed record. Stages run in a fixed order:
/// price, then rating, then the required-field check. Price and missing
/// required fields are fatal for the record; an unrecognized rating word is
/// not (it becomes the 0 sentinel).
pub fn normalize(raw: RawBook) -> Result<Book, RecordError> {
    let price = match raw.price.as_deref() {
        Some(s) => parse_price(s)?,
        None => return Err(RecordError::MissingField("price")),
    };

    let rating = parse_rating(raw.rating_word.as_deref());

    let upc = raw.upc.ok_or(RecordError::MissingField("upc"))?;
    let title = raw.title.ok_or(RecordError::MissingField("title"))?;

    Ok(Book {
        upc,
        title,
        price,
        rating,
        category: raw.category,
        description: raw.description,
    })
}

/// Strip the currency symbol and parse the remainder as a decimal.
pub fn parse_price(raw: &str) -> Result<f64, RecordError> {
    let malformed = || RecordError::MalformedPrice(raw.to_string());
    let caps = PRICE_RE.captures(raw.trim()).ok_or_else(malformed)?;
    caps[1].parse::<f64>().map_err(|_| malformed())
}

/// Exact word lookup; anything unrecognized (or absent) is 0.
pub fn parse_rating(word: Option<&str>) -> u8 {
    word.and_then(|w| RATING_WORDS.iter().find(|(k, _)| *k == w))
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

// ── Tests ──
