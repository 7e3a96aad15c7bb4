use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::render_chain;
use crate::key_types::Keypair;
use crate::machine::{FormData, Mode, OperationError, Stage};
use crate::name::ValidationError;
use crate::record::{Record, RecordVersion, ValidityType, NANOS_PER_SEC};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateValue {
    Init,
    Inspect,
    Create,
}

impl From<Mode> for StateValue {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Inspect => StateValue::Inspect,
            Mode::Create => StateValue::Create,
        }
    }
}

/// Everything the presentation layer may read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: StateValue,
    pub form_data: FormData,
    pub keypair: Option<KeypairView>,
    pub record: Option<RecordView>,
    pub name_to_inspect: String,
    pub name_inspecting: Option<String>,
    pub name_validation_error: Option<ValidationError>,
    pub fetching_record: bool,
    pub error: Option<ErrorView>,
}

/// Public half only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairView {
    pub public_key: String, // base64
    pub name: String,
}

impl<'a> From<&'a Keypair> for KeypairView {
    fn from(keypair: &'a Keypair) -> Self {
        KeypairView {
            public_key: keypair.public_key_base64(),
            name: keypair.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub version: RecordVersion,
    pub value: String,
    pub validity_type: ValidityType,
    pub validity: String,
    pub sequence: u64,
    pub ttl: String,
    pub signature_v2: String, // base64
    pub data: String, // base64
    pub signature_v1: Option<String>, // base64
    pub expired: bool,
    /// The whole record as it goes on the wire, base64
    pub encoded: Option<String>,
}

impl RecordView {
    pub fn new(record: &Record, encoded: Option<&[u8]>) -> Self {
        RecordView {
            version: record.version(),
            value: String::from_utf8_lossy(&record.value).into_owned(),
            validity_type: record.validity_type,
            validity: record.validity.clone(),
            sequence: record.sequence,
            ttl: render_ttl(record.ttl),
            signature_v2: BASE64.encode(&record.signature_v2),
            data: BASE64.encode(&record.data),
            signature_v1: record.signature_v1.as_ref().map(|sig| BASE64.encode(sig)),
            expired: record.is_expired(),
            encoded: encoded.map(|bytes| BASE64.encode(bytes)),
        }
    }
}

fn render_ttl(ttl_ns: u64) -> String {
    if ttl_ns == 0 {
        return "Not set".into();
    }

    if ttl_ns % NANOS_PER_SEC == 0 {
        format!("{} seconds", ttl_ns / NANOS_PER_SEC)
    } else {
        format!("{} seconds", ttl_ns as f64 / NANOS_PER_SEC as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorView {
    pub stage: Stage,
    pub message: String,
}

impl<'a> From<&'a OperationError> for ErrorView {
    fn from(err: &'a OperationError) -> Self {
        ErrorView {
            stage: err.stage,
            message: render_chain(&err.error),
        }
    }
}
