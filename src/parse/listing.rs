use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article.product_pod h3 a").unwrap());
static NEXT_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li.next a").unwrap());

/// Outbound links discovered on one listing page.
#[derive(Debug)]
pub struct Listing {
    /// Detail-page links in document order.
    pub detail_links: Vec<Url>,
    /// Pagination link, absent on the terminal page.
    pub next_page: Option<Url>,
}

/// Pull detail and next-page links out of a listing page. Relative hrefs are
/// resolved against the page's own URL.
pub fn discover(html: &str, base: &Url) -> Listing {
    let doc = Html::parse_document(html);

    let mut detail_links = Vec::new();
    for anchor in doc.select(&DETAIL_LINK) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        match base.join(href) {
            Ok(url) => detail_links.push(url),
            Err(e) => debug!("skipping unresolvable detail href {:?}: {}", href, e),
        }
    }

    let next_page = doc
        .select(&NEXT_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok());

    Listing {
        detail_links,
        next_page,
    }
}

// ── Tests ──
