//! Public-bucket key listing via the ListObjectsV2 REST API.
//!
//! The listing is anonymous, paginated XML with a handful of fixed element
//! names, extracted by regex rather than pulling in an object-store SDK.

use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

use super::{Fetcher, Outcome};

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("<Key>([^<]+)</Key>").expect("static regex"))
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("<NextContinuationToken>([^<]+)</NextContinuationToken>")
            .expect("static regex")
    })
}

fn truncated_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("<IsTruncated>(true|false)</IsTruncated>").expect("static regex"))
}

/// Lists every key under `prefix`, following continuation tokens until the
/// listing reports itself complete. Keys are optionally filtered by
/// `key_pattern`.
///
/// # Errors
///
/// Returns an error when a listing request fails.
pub fn list_bucket(
    fetcher: &Fetcher,
    endpoint: &str,
    prefix: &str,
    key_pattern: Option<&Regex>,
) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let mut url = Url::parse(endpoint).map_err(|e| Error::Http {
            url: endpoint.to_owned(),
            details: Cow::Owned(format!("invalid bucket endpoint: {e}")),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("list-type", "2");
            pairs.append_pair("prefix", prefix);
            if let Some(token) = &token {
                pairs.append_pair("continuation-token", token);
            }
        }

        let response = fetcher.client().get(url.as_str()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                url: url.into(),
                details: Cow::Owned(format!("status {status}")),
            });
        }
        let body = response.text()?;
        let page = parse_listing(&body);
        keys.extend(page.keys);
        if !page.truncated {
            break;
        }
        let Some(next) = page.next_token else {
            break;
        };
        token = Some(next);
    }

    if let Some(pattern) = key_pattern {
        keys.retain(|key| pattern.is_match(key));
    }
    Ok(keys)
}

/// Downloads one listed object through the shared download path.
///
/// # Errors
///
/// Returns an error when the download fails.
pub fn download_object(
    fetcher: &Fetcher,
    endpoint: &str,
    key: &str,
    dest: &Path,
) -> Result<Outcome> {
    let url = format!("{}/{key}", endpoint.trim_end_matches('/'));
    fetcher.download(&url, dest)
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Listing {
    pub keys: Vec<String>,
    pub truncated: bool,
    pub next_token: Option<String>,
}

pub(crate) fn parse_listing(body: &str) -> Listing {
    let keys = key_regex()
        .captures_iter(body)
        .map(|c| unescape_xml(&c[1]))
        .collect();
    let truncated = truncated_regex()
        .captures(body)
        .is_some_and(|c| &c[1] == "true");
    let next_token = token_regex().captures(body).map(|c| unescape_xml(&c[1]));
    Listing {
        keys,
        truncated,
        next_token,
    }
}

/// The five predefined XML entities; listings produce nothing else.
fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::parse_listing;

    #[test]
    fn parses_keys_and_pagination() {
        let body = r"<?xml version='1.0'?>
<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>data/part_000.csv.gz</Key><Size>10</Size></Contents>
  <Contents><Key>data/part_001.csv.gz</Key><Size>11</Size></Contents>
  <NextContinuationToken>tok&amp;1</NextContinuationToken>
</ListBucketResult>";
        let listing = parse_listing(body);
        assert_eq!(
            listing.keys,
            ["data/part_000.csv.gz", "data/part_001.csv.gz"]
        );
        assert!(listing.truncated);
        assert_eq!(listing.next_token.as_deref(), Some("tok&1"));
    }

    #[test]
    fn final_page_has_no_token() {
        let body = "<ListBucketResult><IsTruncated>false</IsTruncated>\
                    <Contents><Key>data/last.csv</Key></Contents></ListBucketResult>";
        let listing = parse_listing(body);
        assert_eq!(listing.keys, ["data/last.csv"]);
        assert!(!listing.truncated);
        assert!(listing.next_token.is_none());
    }
}
