//! Key vault boundary and an in-memory ed25519 implementation

use ed25519_dalek::{Signer, SigningKey};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::info;
use crate::{
    errors::{EngineError, EngineResult},
    types::AccountAddress,
};

// Authentication scheme byte appended to the public key before hashing.
const ED25519_SCHEME: u8 = 0x00;

pub trait MessageSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];

    fn sign(&self, message: &[u8]) -> [u8; 64];
}

/// The signing credential used to authorize ledger operations.
#[derive(Clone)]
pub struct Identity {
    address: AccountAddress,
    signer: Arc<dyn MessageSigner>,
}

impl Identity {
    pub fn new(address: AccountAddress, signer: Arc<dyn MessageSigner>) -> Self {
        Self { address, signer }
    }

    pub fn address(&self) -> &AccountAddress {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        alloy::hex::encode_prefixed(self.signer.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signer.sign(message)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub trait KeyVault: Send + Sync {
    /// Returns the stored identity, creating one if none exists. A seed
    /// replaces the stored key (re-key).
    fn load_or_create_identity(&self, seed: Option<[u8; 32]>) -> EngineResult<Identity>;

    fn clear(&self) -> EngineResult<()>;
}

pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Account address: `sha3_256(public_key || scheme)`.
    pub fn account_address(&self) -> AccountAddress {
        let mut hasher = Sha3_256::new();
        hasher.update(self.key.verifying_key().as_bytes());
        hasher.update([ED25519_SCHEME]);
        AccountAddress::from_bytes(hasher.finalize().into())
    }

    pub fn into_identity(self) -> Identity {
        let address = self.account_address();
        Identity::new(address, Arc::new(self))
    }
}

impl MessageSigner for Ed25519Signer {
    fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }
}

/// Vault that keeps the seed in process memory only.
#[derive(Default)]
pub struct MemoryKeyVault {
    seed: Mutex<Option<[u8; 32]>>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            seed: Mutex::new(Some(seed)),
        }
    }
}

impl KeyVault for MemoryKeyVault {
    fn load_or_create_identity(&self, seed: Option<[u8; 32]>) -> EngineResult<Identity> {
        let mut stored = self
            .seed
            .lock()
            .map_err(|_| EngineError::Vault("vault lock poisoned".to_string()))?;

        let seed = match (seed, *stored) {
            (Some(seed), _) => seed,
            (None, Some(existing)) => existing,
            (None, None) => {
                info!("No stored key, generating a new signing identity");
                rand::random::<[u8; 32]>()
            }
        };
        *stored = Some(seed);

        Ok(Ed25519Signer::from_seed(&seed).into_identity())
    }

    fn clear(&self) -> EngineResult<()> {
        let mut stored = self
            .seed
            .lock()
            .map_err(|_| EngineError::Vault("vault lock poisoned".to_string()))?;
        *stored = None;
        Ok(())
    }
}
