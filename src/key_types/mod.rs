use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::*;
use crate::name::ParsedName;

mod keypair;

// Re-export types
pub use self::keypair::Keypair;

// lazy-load a "global" random number generator
lazy_static! {
    pub static ref RANDOM: SystemRandom = {
        let r = SystemRandom::new();
        // Warm up the random number generator
        r.fill(&mut [0 as u8; 4096]).expect("failed to initialize random");
        r
    };
}

/// Source of signing keys for record creation.
///
/// Every call to `generate` produces a fresh key; the caller replaces whatever
/// it held before; records signed with the old key no longer match the new name.
pub trait KeyManager: Send + 'static {
    fn generate(&self) -> Result<Keypair>;

    fn public_identifier(&self, keypair: &Keypair) -> ParsedName {
        keypair.name()
    }
}

/// Ed25519 keys from the system RNG, held only in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519KeyManager;

impl KeyManager for Ed25519KeyManager {
    fn generate(&self) -> Result<Keypair> {
        let keypair = Keypair::generate()?;
        info!(name = %keypair.name(), "generated new keypair");
        Ok(keypair)
    }
}
