//! Remote record lookup.
//!
//! Resolution itself (DHT, HTTP gateways, ...) lives outside this crate; the
//! machine only consumes a [`Fetcher`]. [`MemoryFetcher`] is an in-process
//! implementation for tests and demos.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::name::ParsedName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    NotFound,
    Timeout,
    NetworkError(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FetchError::NotFound => f.write_str("no record published under this name"),
            FetchError::Timeout => f.write_str("timed out waiting for a record"),
            FetchError::NetworkError(ref reason) => write!(f, "network error: {}", reason),
        }
    }
}

/// Resolve a name to the raw bytes of its published record.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, name: &ParsedName) -> Result<Vec<u8>, FetchError>;
}

/// Records keyed by canonical name.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    entries: Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>,
    delay: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        MemoryFetcher {
            entries: Mutex::default(),
            delay: Some(delay),
        }
    }

    pub fn publish(&self, name: &ParsedName, record: Vec<u8>) {
        self.set(name, Ok(record));
    }

    /// Make lookups of `name` fail with `err`.
    pub fn fail(&self, name: &ParsedName, err: FetchError) {
        self.set(name, Err(err));
    }

    fn set(&self, name: &ParsedName, entry: Result<Vec<u8>, FetchError>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(name.as_str().to_string(), entry);
    }

    fn get(&self, name: &ParsedName) -> Result<Vec<u8>, FetchError> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(name.as_str())
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, name: &ParsedName) -> Result<Vec<u8>, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.get(name)
    }
}
