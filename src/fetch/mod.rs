//! Dataset downloads over plain HTTP.
//!
//! One blocking client per process, no retries. Downloads stream to a
//! `.part` file and are renamed into place so a killed process never leaves
//! a plausible-looking partial file.

mod bucket;
mod drive;
mod index;

pub use bucket::{download_object, list_bucket};
pub use drive::download_drive;
pub use index::{IndexEntry, list_index};

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};

use crate::decompress::part_path;
use crate::error::{Error, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const USER_AGENT: &str = concat!("corprep/", env!("CARGO_PKG_VERSION"));

/// What a download did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    Replaced,
    Skipped,
}

/// Blocking HTTP client shared by all fetch operations.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }

    /// Downloads `url` to `dest`, skipping when the local file already
    /// matches the remote `Content-Length`. Zero-byte local files are
    /// always replaced; an absent or failing HEAD keeps the local file.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status or an I/O failure.
    pub fn download(&self, url: &str, dest: &Path) -> Result<Outcome> {
        let existing = dest.metadata().ok().map(|m| m.len());
        if let Some(local_size) = existing
            && local_size > 0
        {
            match self.remote_size(url) {
                Some(remote_size) if remote_size != local_size => {}
                // Size matches, or the server would not say: keep the file.
                _ => return Ok(Outcome::Skipped),
            }
        }

        let response = self.client.get(url).send()?;
        stream_to_file(response, url, dest)?;
        Ok(if existing.is_some() {
            Outcome::Replaced
        } else {
            Outcome::Downloaded
        })
    }

    /// HEAD `Content-Length`. Servers that reject HEAD yield `None`.
    fn remote_size(&self, url: &str) -> Option<u64> {
        let response = self.client.head(url).send().ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.content_length()
    }
}

/// Checks the status and streams a response body to `dest` via `.part`.
pub(crate) fn stream_to_file(mut response: Response, url: &str, dest: &Path) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Http {
            url: url.to_owned(),
            details: Cow::Owned(format!("status {status}")),
        });
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let part = part_path(dest);
    let mut file = BufWriter::new(File::create(&part)?);
    io::copy(&mut response, &mut file)?;
    // A swallowed flush error would let a truncated .part land at dest and
    // satisfy every later skip-if-exists check.
    file.into_inner().map_err(io::IntoInnerError::into_error)?;
    fs::rename(&part, dest)?;
    Ok(())
}
