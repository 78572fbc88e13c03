//! HTTP implementation of ranged fetching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use super::{ByteRange, RangeFetch, WindowBuffer};
use crate::error::{Error, Result};

/// Fetches byte windows of a remote file over HTTP.
///
/// The server must honor `Range` requests and echo the window it served in a
/// `Content-Range` header; a successful response without that header fails
/// with [`Error::RangeUnsupported`] rather than being mistaken for a
/// full-file download.
///
/// Transport configuration (TLS, proxies, timeouts, default headers) travels
/// in the caller-supplied [`Client`] and is forwarded verbatim.
pub struct HttpFetcher {
    client: Client,
    url: String,
    support_suffix_range: bool,
    transferred_bytes: AtomicU64,
}

impl HttpFetcher {
    /// Request timeout of the built-in client.
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a fetcher with a default client.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Self::DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(url, client))
    }

    /// Create a fetcher around a preconfigured client.
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            url: url.into(),
            support_suffix_range: true,
            transferred_bytes: AtomicU64::new(0),
        }
    }

    /// Declare whether the server accepts suffix ranges (`bytes=-N`).
    ///
    /// When it does not, suffix requests are rewritten into explicit ranges
    /// after a size probe, at the cost of one extra round trip.
    pub fn support_suffix_range(mut self, support: bool) -> Self {
        self.support_suffix_range = support;
        self
    }

    /// Total window bytes fetched from the network so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Resolve the window actually served from the echoed `Content-Range`
    /// header. A 2xx response without the header means the server ignored
    /// the range and sent the whole file.
    fn served_window(header: Option<&str>) -> Result<(u64, u64)> {
        Self::parse_content_range(header.ok_or(Error::RangeUnsupported)?)
    }

    /// Parse a `Content-Range` header like `bytes 100-199/1234` into the
    /// inclusive window actually served.
    fn parse_content_range(value: &str) -> Result<(u64, u64)> {
        let window = value
            .strip_prefix("bytes")
            .unwrap_or(value)
            .trim_start()
            .split('/')
            .next()
            .unwrap_or("");
        let (start, end) = window.split_once('-').ok_or(Error::RangeUnsupported)?;
        let start: u64 = start.trim().parse().map_err(|_| Error::RangeUnsupported)?;
        let end: u64 = end.trim().parse().map_err(|_| Error::RangeUnsupported)?;
        if end < start {
            return Err(Error::RangeUnsupported);
        }
        Ok((start, end))
    }

    /// Interpret a `Content-Length` header from the size probe; a response
    /// without a parseable length cannot drive ranged access.
    fn parse_content_length(value: Option<&str>) -> Result<u64> {
        value
            .and_then(|v| v.parse().ok())
            .ok_or(Error::MetadataMissing)
    }
}

impl RangeFetch for HttpFetcher {
    fn fetch(&self, range: ByteRange, stream: bool) -> Result<WindowBuffer> {
        let range = match range {
            suffix @ ByteRange::Suffix { .. } if !self.support_suffix_range => {
                suffix.into_bounded(self.total_size()?)
            }
            other => other,
        };

        debug!(
            "GET {} range={} stream={stream}",
            self.url,
            range.to_header_value()
        );
        let mut response = self
            .client
            .get(&self.url)
            .header(RANGE, range.to_header_value())
            .send()?
            .error_for_status()?;

        let served = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok());
        let (start, end) = Self::served_window(served)?;
        let size = end - start + 1;
        self.transferred_bytes.fetch_add(size, Ordering::Relaxed);

        if stream {
            Ok(WindowBuffer::streaming(Box::new(response), start, size))
        } else {
            let mut data = Vec::with_capacity(size as usize);
            response.copy_to(&mut data)?;
            Ok(WindowBuffer::buffered(data, start))
        }
    }

    fn total_size(&self) -> Result<u64> {
        debug!("HEAD {}", self.url);
        let response = self.client.head(&self.url).send()?.error_for_status()?;
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok());
        Self::parse_content_length(length)
    }
}
