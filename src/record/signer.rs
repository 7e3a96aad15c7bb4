//! Record signatures.
//!
//! V2 signs `"ipns-signature:" ++ data`. The legacy V1 signature signs the
//! raw `value ++ validity ++ "EOL"` concatenation with no prefix, so the two
//! signing domains never overlap.

use ring::signature::{self, UnparsedPublicKey};

use crate::errors::*;
use crate::key_types::Keypair;
use crate::name::ED25519_KEY_LEN;
use crate::record::{Record, RecordFields};

pub const V2_SIGNATURE_PREFIX: &[u8] = b"ipns-signature:";

pub fn v2_signable(data: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(V2_SIGNATURE_PREFIX.len() + data.len());
    msg.extend_from_slice(V2_SIGNATURE_PREFIX);
    msg.extend_from_slice(data);
    msg
}

pub fn v1_signable(fields: &RecordFields) -> Vec<u8> {
    let validity_type = fields.validity_type.as_str().as_bytes();
    let mut msg =
        Vec::with_capacity(fields.value.len() + fields.validity.len() + validity_type.len());
    msg.extend_from_slice(&fields.value);
    msg.extend_from_slice(fields.validity.as_bytes());
    msg.extend_from_slice(validity_type);
    msg
}

/// The V2 signature over `fields`.
pub fn sign(fields: &RecordFields, keypair: &Keypair) -> Result<Vec<u8>> {
    let data = fields.to_data_bytes()?;
    Ok(keypair.sign(&v2_signable(&data)))
}

/// Build a complete signed record from `fields`, optionally with a legacy V1
/// signature alongside the V2 one.
pub fn seal(fields: RecordFields, keypair: &Keypair, v1_compatible: bool) -> Result<Record> {
    let data = fields.to_data_bytes()?;
    let signature_v2 = keypair.sign(&v2_signable(&data));
    let signature_v1 = if v1_compatible {
        Some(keypair.sign(&v1_signable(&fields)))
    } else {
        None
    };

    Ok(Record {
        value: fields.value,
        validity_type: fields.validity_type,
        validity: fields.validity,
        sequence: fields.sequence,
        ttl: fields.ttl,
        signature_v2: signature_v2,
        data: data,
        signature_v1: signature_v1,
    })
}

/// Check a record against the public key embedded in its name.
///
/// Fails with `SignatureMismatch` if the data sub-record doesn't describe the
/// record's own fields, if the V2 signature is bad, or if a V1 signature is
/// present and bad.
pub fn verify(record: &Record, public_key: &[u8; ED25519_KEY_LEN]) -> Result<()> {
    let pk = UnparsedPublicKey::new(&signature::ED25519, &public_key[..]);

    match RecordFields::from_data_bytes(&record.data) {
        Ok(ref signed) if *signed == record.fields() => {}
        _ => {
            debug!("data sub-record does not match record fields");
            bail!(ErrorKind::SignatureMismatch);
        }
    }

    if pk.verify(&v2_signable(&record.data), &record.signature_v2).is_err() {
        debug!("V2 signature rejected");
        bail!(ErrorKind::SignatureMismatch);
    }

    if let Some(ref sig_v1) = record.signature_v1 {
        if pk.verify(&v1_signable(&record.fields()), sig_v1).is_err() {
            debug!("legacy V1 signature rejected");
            bail!(ErrorKind::SignatureMismatch);
        }
    }

    Ok(())
}
