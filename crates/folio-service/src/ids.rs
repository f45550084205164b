use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use uuid::Builder;

#[derive(Error, Debug)]
#[error("failed to read from the randomness source: {0}")]
pub struct IdError(#[from] pub rand::Error);

/// Produces identifiers for newly created content items.
pub trait IdGenerator: Send + Sync + 'static {
    fn new_id(&self) -> Result<String, IdError>;
}

/// Random (version 4) UUIDs drawn from the operating system's randomness
/// source. A failing source is reported rather than retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&self) -> Result<String, IdError> {
        let mut bytes = [0u8; 16];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Builder::from_random_bytes(bytes)
            .into_uuid()
            .hyphenated()
            .to_string())
    }
}
