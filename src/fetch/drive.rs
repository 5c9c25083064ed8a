//! Google Drive downloads, including the large-file confirm interstitial.

use std::borrow::Cow;
use std::path::Path;
use std::sync::OnceLock;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{Error, Result};

use super::{Fetcher, Outcome, stream_to_file};

const DRIVE_URL: &str = "https://drive.google.com/uc";

fn form_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("form#download-form").expect("static selector"))
}

fn hidden_input_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("input[type=\"hidden\"]").expect("static selector"))
}

/// Downloads a Drive file by id. Small files come back directly; large
/// files answer with a virus-scan interstitial whose form is followed once.
///
/// # Errors
///
/// Returns an error when the response carries neither file content nor a
/// download form (permission or quota), or on I/O failure.
pub fn download_drive(fetcher: &Fetcher, id: &str, dest: &Path) -> Result<Outcome> {
    if dest.metadata().is_ok_and(|m| m.len() > 0) {
        return Ok(Outcome::Skipped);
    }

    let url = format!("{DRIVE_URL}?export=download&id={id}");
    let response = fetcher.client().get(&url).send()?;
    if !is_html(response.headers()) {
        stream_to_file(response, &url, dest)?;
        return Ok(Outcome::Downloaded);
    }

    let body = response.text()?;
    let Some((action, params)) = parse_confirm_form(&body) else {
        return Err(Error::Http {
            url,
            details: Cow::Owned(format!(
                "drive file {id} returned no content and no download form (permission or quota?)"
            )),
        });
    };
    let confirm_url =
        Url::parse_with_params(&action, &params).map_err(|e| Error::Http {
            url: action.clone(),
            details: Cow::Owned(format!("invalid confirm form action: {e}")),
        })?;

    let response = fetcher.client().get(confirm_url.as_str()).send()?;
    if is_html(response.headers()) {
        return Err(Error::Http {
            url: confirm_url.into(),
            details: Cow::Owned(format!("drive file {id} still answered html after confirm")),
        });
    }
    stream_to_file(response, confirm_url.as_str(), dest)?;
    Ok(Outcome::Downloaded)
}

fn is_html(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Pulls the confirm form's action URL and hidden inputs out of the
/// interstitial page.
pub(crate) fn parse_confirm_form(body: &str) -> Option<(String, Vec<(String, String)>)> {
    let document = Html::parse_document(body);
    let form = document.select(form_selector()).next()?;
    let action = form.value().attr("action")?.to_owned();
    let params = form
        .select(hidden_input_selector())
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_owned(), value.to_owned()))
        })
        .collect();
    Some((action, params))
}

#[cfg(test)]
mod tests {
    use super::parse_confirm_form;

    const INTERSTITIAL: &str = r#"
<html><body>
<form id="download-form" action="https://drive.usercontent.google.com/download" method="get">
  <input type="hidden" name="id" value="abc123">
  <input type="hidden" name="export" value="download">
  <input type="hidden" name="confirm" value="t">
  <input type="submit" value="Download anyway">
</form>
</body></html>
"#;

    #[test]
    fn parses_action_and_hidden_inputs() {
        let (action, params) = parse_confirm_form(INTERSTITIAL).expect("form present");
        assert_eq!(action, "https://drive.usercontent.google.com/download");
        assert_eq!(
            params,
            vec![
                ("id".to_owned(), "abc123".to_owned()),
                ("export".to_owned(), "download".to_owned()),
                ("confirm".to_owned(), "t".to_owned()),
            ]
        );
    }

    #[test]
    fn missing_form_is_none() {
        assert!(parse_confirm_form("<html><body>quota exceeded</body></html>").is_none());
    }
}
