use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::fetcher::FetchError;
use crate::name::ParsedName;

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, FetchError>> + Send>>;

/// Identifies one dispatched fetch: the machine generation it belongs to and
/// the input text it was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub name: String,
    pub parsed: ParsedName,
}

/// A fetch the machine has accepted but not yet run. The owner drives it to
/// completion (typically on another task) and hands the outcome back through
/// `Machine::settle`.
pub struct PendingFetch {
    ticket: FetchTicket,
    future: FetchFuture,
}

/// The tagged result of a `PendingFetch`.
#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: FetchTicket,
    pub result: Result<Vec<u8>, FetchError>,
}

impl PendingFetch {
    pub(crate) fn new(ticket: FetchTicket, future: FetchFuture) -> Self {
        PendingFetch {
            ticket: ticket,
            future: future,
        }
    }

    pub fn ticket(&self) -> &FetchTicket {
        &self.ticket
    }

    pub async fn run(self) -> FetchOutcome {
        let result = self.future.await;
        FetchOutcome {
            ticket: self.ticket,
            result: result,
        }
    }
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}
