use std::fmt;

use crate::config::MachineConfig;
use crate::datetime_utils::ValidityTime;
use crate::errors::*;
use crate::record::{RecordFields, ValidityType, NANOS_PER_SEC};

/// 365 days
pub const MAX_VALIDITY: u64 = 365 * 24 * 60 * 60;
pub const MIN_VALIDITY: u64 = 1;
pub const MIN_TTL: u64 = 1;
pub const MIN_SEQUENCE: u64 = 0;

/// The create form, exactly as typed. Numbers are only checked on `CREATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub value: String,
    pub ttl: String,
    pub validity: String,
    pub sequence: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Value,
    Ttl,
    Validity,
    Sequence,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            FormField::Value => "value",
            FormField::Ttl => "ttl",
            FormField::Validity => "validity",
            FormField::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

/// A form that passed validation, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidForm {
    pub value: String,
    pub ttl_secs: u64,
    pub validity_secs: u64,
    pub sequence: u64,
}

impl Default for FormData {
    fn default() -> Self {
        Self::from_config(&MachineConfig::default())
    }
}

impl FormData {
    pub fn from_config(config: &MachineConfig) -> Self {
        FormData {
            value: config.default_value.clone(),
            ttl: config.default_ttl_secs.to_string(),
            validity: config.default_validity_secs.to_string(),
            sequence: config.default_sequence.to_string(),
        }
    }

    /// Store one field. Numeric fields are trimmed; range checks wait for `validate`.
    pub fn set(&mut self, field: FormField, value: &str) {
        match field {
            FormField::Value => self.value = value.to_string(),
            FormField::Ttl => self.ttl = value.trim().to_string(),
            FormField::Validity => self.validity = value.trim().to_string(),
            FormField::Sequence => self.sequence = value.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<ValidForm> {
        if self.value.is_empty() {
            bail!(ErrorKind::InvalidFormData("value is required".into()));
        }

        Ok(ValidForm {
            value: self.value.clone(),
            ttl_secs: parse_whole(FormField::Ttl, &self.ttl, MIN_TTL, u64::MAX / NANOS_PER_SEC)?,
            validity_secs: parse_whole(FormField::Validity, &self.validity, MIN_VALIDITY, MAX_VALIDITY)?,
            sequence: parse_whole(FormField::Sequence, &self.sequence, MIN_SEQUENCE, u64::MAX)?,
        })
    }
}

impl ValidForm {
    /// Fix the expiry relative to the local clock and convert TTL to nanoseconds.
    pub fn into_fields(self) -> Result<RecordFields> {
        let validity = ValidityTime::expires_in(self.validity_secs)?;

        Ok(RecordFields {
            value: self.value.into_bytes(),
            validity_type: ValidityType::Eol,
            validity: validity.as_str().to_string(),
            sequence: self.sequence,
            ttl: self.ttl_secs * NANOS_PER_SEC,
        })
    }
}

/// Accepts anything that reads as a non-negative whole number (`"60"`,
/// `"60.0"`, `"6e1"`) within `[min, max]`.
fn parse_whole(field: FormField, text: &str, min: u64, max: u64) -> Result<u64> {
    let n = match text.parse::<u64>() {
        Ok(n) => n,
        Err(_) => match text.parse::<f64>() {
            _ if text.is_empty() => return Err(invalid(field, "is required")),
            Ok(x) if !x.is_finite() => return Err(invalid(field, "is not a number")),
            Ok(x) if x.is_sign_negative() && x != 0.0 => {
                return Err(invalid(field, "must not be negative"))
            }
            Ok(x) if x.fract() != 0.0 => return Err(invalid(field, "must be a whole number")),
            Ok(x) if x >= 18_446_744_073_709_551_616.0 => return Err(invalid(field, "is too large")),
            Ok(x) => x as u64,
            Err(_) => return Err(invalid(field, "is not a number")),
        },
    };

    if n < min || n > max {
        return Err(invalid(field, &format!("must be between {} and {}", min, max)));
    }

    Ok(n)
}

fn invalid(field: FormField, reason: &str) -> Error {
    ErrorKind::InvalidFormData(format!("{} {}", field, reason)).into()
}
