use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::blocking::Client;
use tracing::{debug, info, trace, warn};

use crate::record::{Page, RawPage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Window of the remote record set to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub skip: usize,
}

/// Anything that can hand out a page of raw product records.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, request: PageRequest) -> Result<RawPage, SourceError>;
    fn describe(&self) -> String;
}

pub struct HttpSource {
    url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl RecordSource for HttpSource {
    fn fetch(&self, request: PageRequest) -> Result<RawPage, SourceError> {
        debug!("GET {} limit={} skip={}", self.url, request.limit, request.skip);
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", request.limit), ("skip", request.skip)])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Failed to fetch products")
                    .to_string(),
            });
        }
        Ok(response.json::<RawPage>()?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Serves a page from a JSON file shaped like the API response.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RecordSource for FileSource {
    fn fetch(&self, request: PageRequest) -> Result<RawPage, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let page: RawPage = serde_json::from_str(&content)?;
        let total = page.products.len();
        let products = page
            .products
            .into_iter()
            .skip(request.skip)
            .take(request.limit)
            .collect();
        Ok(RawPage {
            products,
            total,
            skip: request.skip,
            limit: request.limit,
        })
    }

    fn describe(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

struct FetchOutcome {
    token: u64,
    request: PageRequest,
    result: Result<Page, SourceError>,
}

/// Runs source requests off the UI thread. Every request gets a new token
/// and only the response carrying the latest token is ever handed out.
pub struct Fetcher {
    source: Arc<dyn RecordSource>,
    sender: Sender<FetchOutcome>,
    receiver: Receiver<FetchOutcome>,
    latest: u64,
    pending: bool,
}

impl Fetcher {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            source,
            sender,
            receiver,
            latest: 0,
            pending: false,
        }
    }

    pub fn request(&mut self, request: PageRequest) -> u64 {
        self.latest += 1;
        self.pending = true;
        let token = self.latest;
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        info!(
            "Fetching #{token} from {} (limit {}, skip {})",
            source.describe(),
            request.limit,
            request.skip
        );

        thread::spawn(move || {
            let start_time = Instant::now();
            let result = source
                .fetch(request)
                .map(|raw| Page::from_raw(raw, Utc::now()));
            trace!("Fetch #{token} finished in {}ms", start_time.elapsed().as_millis());
            if sender.send(FetchOutcome { token, request, result }).is_err() {
                trace!("Fetch #{token} finished after the receiver was dropped");
            }
        });
        token
    }

    /// Returns the response to the latest request once it arrived.
    pub fn poll(&mut self) -> Option<(PageRequest, Result<Page, SourceError>)> {
        let mut fresh = None;
        while let Ok(outcome) = self.receiver.try_recv() {
            if outcome.token == self.latest {
                self.pending = false;
                fresh = Some((outcome.request, outcome.result));
            } else {
                warn!(
                    "Discarding stale response #{} (latest is #{})",
                    outcome.token, self.latest
                );
            }
        }
        fresh
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn latest_token(&self) -> u64 {
        self.latest
    }
}
