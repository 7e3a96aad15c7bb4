//! IPNS records.
//!
//! A [`Record`] carries every signed field twice: once at the top level of the
//! envelope (see [`codec`]) and once inside `data`, a CBOR map that the V2
//! signature covers (see [`signer`]). [`RecordFields`] is the unsigned set of
//! fields that both copies are built from.

use std::fmt;

use crate::datetime_utils::ValidityTime;
use crate::errors::*;

pub mod codec;
pub mod signer;

/// Nanoseconds per second; TTLs are collected in seconds, stored in ns.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// How `validity` is to be read. EOL ("end of life") is the only kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidityType {
    #[serde(rename = "EOL")]
    Eol,
}

impl ValidityType {
    pub fn tag(self) -> u8 {
        match self {
            ValidityType::Eol => 0,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValidityType::Eol),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidityType::Eol => "EOL",
        }
    }
}

impl fmt::Display for ValidityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record still carries the legacy V1 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordVersion {
    #[serde(rename = "V1+V2")]
    V1V2,
    #[serde(rename = "V2")]
    V2,
}

impl fmt::Display for RecordVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RecordVersion::V1V2 => f.write_str("V1+V2"),
            RecordVersion::V2 => f.write_str("V2"),
        }
    }
}

/// The signed content of a record, before any signature exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    pub value: Vec<u8>,
    pub validity_type: ValidityType,
    pub validity: String,
    pub sequence: u64,
    pub ttl: u64,
}

impl RecordFields {
    /// Canonical CBOR bytes of the `data` sub-record.
    pub fn to_data_bytes(&self) -> Result<Vec<u8>> {
        let data = RecordData {
            value: self.value.clone(),
            validity_type: self.validity_type.tag(),
            validity: self.validity.as_bytes().to_vec(),
            sequence: self.sequence,
            ttl: self.ttl,
        };

        minicbor::to_vec(&data).map_err(|_| malformed("failed to encode data sub-record"))
    }

    pub fn from_data_bytes(bytes: &[u8]) -> Result<Self> {
        let data: RecordData =
            minicbor::decode(bytes).map_err(|e| malformed(format!("data sub-record: {}", e)))?;

        let validity_type = ValidityType::from_tag(data.validity_type)
            .ok_or_else(|| malformed(format!("unknown validity type {}", data.validity_type)))?;
        let validity = String::from_utf8(data.validity)
            .map_err(|_| malformed("data sub-record validity is not utf8"))?;

        Ok(RecordFields {
            value: data.value,
            validity_type: validity_type,
            validity: validity,
            sequence: data.sequence,
            ttl: data.ttl,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(map)]
struct RecordData {
    #[n(0)]
    #[cbor(with = "minicbor::bytes")]
    value: Vec<u8>,

    #[n(1)]
    validity_type: u8,

    #[n(2)]
    #[cbor(with = "minicbor::bytes")]
    validity: Vec<u8>,

    #[n(3)]
    sequence: u64,

    #[n(4)]
    ttl: u64,
}

/// A signed IPNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: Vec<u8>,
    pub validity_type: ValidityType,
    pub validity: String,
    pub sequence: u64,
    /// Nanoseconds
    pub ttl: u64,
    pub signature_v2: Vec<u8>,
    pub data: Vec<u8>,
    pub signature_v1: Option<Vec<u8>>,
}

impl Record {
    pub fn fields(&self) -> RecordFields {
        RecordFields {
            value: self.value.clone(),
            validity_type: self.validity_type,
            validity: self.validity.clone(),
            sequence: self.sequence,
            ttl: self.ttl,
        }
    }

    pub fn version(&self) -> RecordVersion {
        if self.signature_v1.is_some() {
            RecordVersion::V1V2
        } else {
            RecordVersion::V2
        }
    }

    pub fn validity_time(&self) -> Result<ValidityTime> {
        ValidityTime::from_str(&self.validity)
    }

    /// Unparseable validity counts as expired.
    pub fn is_expired(&self) -> bool {
        self.validity_time().map(|t| t.is_past()).unwrap_or(true)
    }
}
