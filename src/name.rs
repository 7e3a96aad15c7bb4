//! IPNS name parsing.
//!
//! Two syntaxes are accepted, both self-certifying (the Ed25519 public key
//! that signs the record is embedded in the name itself):
//!
//! ```text
//! CID name:  multibase( 0x01 | 0x72 | multihash )      e.g. k51qzi5uqu5d...
//! Peer ID:   base58btc( multihash )                     e.g. 12D3KooW...
//!
//! multihash: 0x00 | len | PublicKey protobuf { 1: KeyType, 2: key bytes }
//! ```

use std::fmt;

use multibase::Base;
use untrusted;

const CID_V1: u64 = 0x01;
const LIBP2P_KEY_CODEC: u64 = 0x72;

const IDENTITY_MULTIHASH: u64 = 0x00;
const SHA2_256_MULTIHASH: u64 = 0x12;
const SHA2_256_LEN: usize = 32;

// protobuf tags of `PublicKey { Type = 1 (varint), Data = 2 (bytes) }`
const PB_KEY_TYPE_TAG: u8 = 0x08;
const PB_KEY_DATA_TAG: u8 = 0x12;
const ED25519_KEY_TYPE: u64 = 1;

pub const ED25519_KEY_LEN: usize = 32;

/// Why a name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    EmptyInput,
    InvalidEncoding,
    WrongKeyType,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            ValidationError::EmptyInput => "name is empty",
            ValidationError::InvalidEncoding => "not a valid IPNS name (expected k51... or 12D...)",
            ValidationError::WrongKeyType => "only Ed25519 IPNS names are supported",
        };
        f.write_str(msg)
    }
}

/// Which of the two accepted syntaxes a name was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameEncoding {
    Cid,
    PeerId,
}

/// A validated IPNS name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    canonical: String,
    public_key: [u8; ED25519_KEY_LEN],
    encoding: NameEncoding,
}

impl ParsedName {
    /// Derive the canonical (base36 CID) name for an Ed25519 public key.
    pub fn from_public_key(public_key: [u8; ED25519_KEY_LEN]) -> Self {
        let mut cid = vec![
            CID_V1 as u8,
            LIBP2P_KEY_CODEC as u8,
            IDENTITY_MULTIHASH as u8,
            (4 + ED25519_KEY_LEN) as u8,
            PB_KEY_TYPE_TAG,
            ED25519_KEY_TYPE as u8,
            PB_KEY_DATA_TAG,
            ED25519_KEY_LEN as u8,
        ];
        cid.extend_from_slice(&public_key);

        ParsedName {
            canonical: multibase::encode(Base::Base36Lower, &cid),
            public_key: public_key,
            encoding: NameEncoding::Cid,
        }
    }

    /// Canonical base36 form, regardless of how the name was typed.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn public_key(&self) -> &[u8; ED25519_KEY_LEN] {
        &self.public_key
    }

    pub fn encoding(&self) -> NameEncoding {
        self.encoding
    }
}

impl fmt::Display for ParsedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Validate a user-supplied name. Pure; cheap enough to run per keystroke.
pub fn validate(input: &str) -> Result<ParsedName, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    // Peer IDs are bare base58btc multihashes: identity ones start with `1`,
    // sha2-256 ones with `Qm`. Neither is a multibase prefix.
    let (encoding, public_key) = if input.starts_with('1') || input.starts_with("Qm") {
        let bytes = bs58::decode(input)
            .into_vec()
            .map_err(|_| ValidationError::InvalidEncoding)?;
        let key = untrusted::Input::from(&bytes[..])
            .read_all(ValidationError::InvalidEncoding, read_multihash)?;
        (NameEncoding::PeerId, key)
    } else {
        let (base, bytes) =
            multibase::decode(input).map_err(|_| ValidationError::InvalidEncoding)?;
        // The identity "base" is raw bytes behind a NUL, not a printable name
        if base == Base::Identity {
            return Err(ValidationError::InvalidEncoding);
        }
        let key = untrusted::Input::from(&bytes[..])
            .read_all(ValidationError::InvalidEncoding, read_cid)?;
        (NameEncoding::Cid, key)
    };

    let mut parsed = ParsedName::from_public_key(public_key);
    parsed.encoding = encoding;
    Ok(parsed)
}

fn read_cid(reader: &mut untrusted::Reader) -> Result<[u8; ED25519_KEY_LEN], ValidationError> {
    if read_varint(reader)? != CID_V1 {
        return Err(ValidationError::InvalidEncoding);
    }
    if read_varint(reader)? != LIBP2P_KEY_CODEC {
        return Err(ValidationError::InvalidEncoding);
    }
    read_multihash(reader)
}

fn read_multihash(reader: &mut untrusted::Reader) -> Result<[u8; ED25519_KEY_LEN], ValidationError> {
    let code = read_varint(reader)?;
    let len = read_varint(reader)? as usize;
    let digest = reader
        .read_bytes(len)
        .map_err(|_| ValidationError::InvalidEncoding)?;

    match code {
        IDENTITY_MULTIHASH => {
            let (key_type, key) =
                digest.read_all(ValidationError::InvalidEncoding, read_public_key_pb)?;
            if key_type != ED25519_KEY_TYPE || key.len() != ED25519_KEY_LEN {
                return Err(ValidationError::WrongKeyType);
            }

            let mut public_key = [0u8; ED25519_KEY_LEN];
            public_key.copy_from_slice(key);
            Ok(public_key)
        }
        // Hashed (RSA-era) key: structurally fine, but the key isn't in the name.
        SHA2_256_MULTIHASH if len == SHA2_256_LEN => Err(ValidationError::WrongKeyType),
        _ => Err(ValidationError::InvalidEncoding),
    }
}

fn read_public_key_pb<'a>(
    reader: &mut untrusted::Reader<'a>,
) -> Result<(u64, &'a [u8]), ValidationError> {
    if reader.read_byte().map_err(|_| ValidationError::InvalidEncoding)? != PB_KEY_TYPE_TAG {
        return Err(ValidationError::InvalidEncoding);
    }
    let key_type = read_varint(reader)?;

    if reader.read_byte().map_err(|_| ValidationError::InvalidEncoding)? != PB_KEY_DATA_TAG {
        return Err(ValidationError::InvalidEncoding);
    }
    let len = read_varint(reader)? as usize;
    let key = reader
        .read_bytes(len)
        .map_err(|_| ValidationError::InvalidEncoding)?;

    Ok((key_type, key.as_slice_less_safe()))
}

/// Unsigned LEB128, at most 9 bytes.
fn read_varint(reader: &mut untrusted::Reader) -> Result<u64, ValidationError> {
    let mut value = 0u64;
    for shift in (0..63).step_by(7) {
        let byte = reader
            .read_byte()
            .map_err(|_| ValidationError::InvalidEncoding)?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ValidationError::InvalidEncoding)
}
