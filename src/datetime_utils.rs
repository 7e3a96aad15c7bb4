use chrono::prelude::*;
use chrono::DateTime;
use chrono::Duration;
use crate::errors::*;

/// Largest span (in seconds) accepted by `ValidityTime::expires_in`, keeps
/// chrono's millisecond-based `Duration` well inside its range.
const MAX_SPAN_SECS: u64 = (i64::MAX / 1_000) as u64;

/// An absolute expiry timestamp, kept alongside its canonical RFC3339
/// rendering (UTC, nanosecond precision) so the exact signed bytes are
/// always at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityTime {
    inner: DateTime<Utc>,
    rendered: String,
}

impl ValidityTime {
    fn from_datetime(time: DateTime<Utc>) -> Self {
        let rendered = time.to_rfc3339_opts(SecondsFormat::Nanos, true);

        Self {
            inner: time,
            rendered: rendered,
        }
    }

    /// `now + seconds`
    pub fn expires_in(seconds: u64) -> Result<Self> {
        if seconds > MAX_SPAN_SECS {
            bail!("validity span too large");
        }

        let time = Utc::now()
            .checked_add_signed(Duration::seconds(seconds as i64))
            .ok_or_else(|| Error::from("validity timestamp out of range"))?;

        Ok(Self::from_datetime(time))
    }

    pub fn from_str(input: &str) -> Result<Self> {
        let time = DateTime::parse_from_rfc3339(input)
            .chain_err(|| "Failed to parse time")?
            .with_timezone(&Utc);

        Ok(Self::from_datetime(time))
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn is_past(&self) -> bool {
        self.inner < Utc::now()
    }
}
