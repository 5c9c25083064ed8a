//! HTML directory-listing scrape.

use std::borrow::Cow;
use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{Error, Result};

use super::Fetcher;

/// One file link found on an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub url: String,
    pub file_name: String,
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("static selector"))
}

/// GETs an index page and returns the absolute file URLs it links to.
/// Parent links, query links, and directory links are skipped.
///
/// # Errors
///
/// Returns an error when the page cannot be fetched or its URL is invalid.
pub fn list_index(fetcher: &Fetcher, url: &str) -> Result<Vec<IndexEntry>> {
    let response = fetcher.client().get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http {
            url: url.to_owned(),
            details: Cow::Owned(format!("status {status}")),
        });
    }
    let body = response.text()?;
    extract_links(&body, url)
}

/// Pulls file links out of an index page body, resolved against `page_url`.
pub(crate) fn extract_links(body: &str, page_url: &str) -> Result<Vec<IndexEntry>> {
    let base = Url::parse(page_url).map_err(|e| Error::Http {
        url: page_url.to_owned(),
        details: Cow::Owned(format!("invalid index url: {e}")),
    })?;

    let document = Html::parse_document(body);
    let mut entries = Vec::new();
    for anchor in document.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.contains('?') || href.starts_with("..") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.query().is_some() || resolved.path().ends_with('/') {
            continue;
        }
        // Listings usually carry a parent link rendered as an absolute path.
        if !resolved.as_str().starts_with(base.as_str()) {
            continue;
        }
        let Some(file_name) = resolved
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
        else {
            continue;
        };
        entries.push(IndexEntry {
            file_name: file_name.to_owned(),
            url: resolved.into(),
        });
    }
    Ok(entries)
}
