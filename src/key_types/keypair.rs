use std::fmt;
use std::ops::Deref;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::signature::{self, KeyPair};

use crate::errors::*;
use crate::key_types::RANDOM;
use crate::name::{ParsedName, ED25519_KEY_LEN};

/// An Ed25519 signing keypair.
///
/// The private key lives in the PKCS#8 document and inside ring's parsed
/// keypair. Only the PKCS#8 copy is zeroed on drop; ring's copy is dropped
/// as-is. Neither leaves except through `export_pkcs8_base64`.
pub struct Keypair {
    public_key: [u8; ED25519_KEY_LEN],
    pkcs8: Vec<u8>,
    rendered_kp: signature::Ed25519KeyPair,
}

impl Keypair {
    pub fn generate() -> Result<Self> {
        let pkcs8_bytes = signature::Ed25519KeyPair::generate_pkcs8(RANDOM.deref())
            .map_err(|_| Error::from(ErrorKind::KeyGeneration))?;

        Self::from_pkcs8(pkcs8_bytes.as_ref())
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let key_pair = signature::Ed25519KeyPair::from_pkcs8(pkcs8)
            .chain_err(|| "Failed to load pkcs8")?;

        let mut public_key = [0u8; ED25519_KEY_LEN];
        public_key.copy_from_slice(key_pair.public_key().as_ref());

        Ok(Keypair {
            public_key: public_key,
            pkcs8: pkcs8.to_vec(),
            rendered_kp: key_pair,
        })
    }

    pub fn public_key(&self) -> &[u8; ED25519_KEY_LEN] {
        &self.public_key
    }

    pub fn public_key_base64(&self) -> String {
        BASE64.encode(&self.public_key)
    }

    /// The IPNS name records signed by this key are published under.
    pub fn name(&self) -> ParsedName {
        ParsedName::from_public_key(self.public_key)
    }

    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.rendered_kp.sign(msg).as_ref().to_vec()
    }

    /// Private key backup. This is the one path that exposes secret material.
    pub fn export_pkcs8_base64(&self) -> String {
        warn!(name = %self.name(), "exporting private key material");
        BASE64.encode(&self.pkcs8)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        for b in self.pkcs8.iter_mut() {
            *b = 0;
        }
    }
}
