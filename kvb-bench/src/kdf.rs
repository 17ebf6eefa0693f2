//! The CPU-bound key-derivation primitive under test.
//!
//! The derivation itself is deliberately simple: a blake3 absorb of the
//! secondary and primary buffers, a configurable number of chained rehash
//! rounds (the cost knob), then an XOF stretch to the requested key length.
//! What matters to the harness is the call surface, not the algorithm: the
//! callback entry point below is the single platform signature that every
//! variant adapter must funnel through, and it must be callable concurrently
//! with no shared mutable state between calls.

use kvb_common::{KdfError, KdfOptions};

/// Arguments of one primitive invocation.
#[derive(Debug, Clone)]
pub struct KdfRequest {
    pub primary: Vec<u8>,
    pub secondary: Vec<u8>,
    pub key_length: usize,
    /// Opaque numeric cost bag, forwarded unmodified.
    pub options: KdfOptions,
}

/// Derive a key synchronously. CPU-bound and deterministic: identical
/// requests always produce identical output.
pub fn derive_key_blocking(req: &KdfRequest) -> Result<Vec<u8>, KdfError> {
    if req.key_length == 0 {
        return Err(KdfError::new("key length must be positive").with_code("KVB_KDF_KEYLEN"));
    }
    if req.options.rounds == 0 {
        return Err(KdfError::new("rounds must be positive").with_code("KVB_KDF_ROUNDS"));
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(&req.secondary);
    hasher.update(&req.primary);
    let mut block = *hasher.finalize().as_bytes();
    for _ in 1..req.options.rounds {
        block = *blake3::hash(&block).as_bytes();
    }

    let mut key = vec![0u8; req.key_length];
    let mut output = blake3::Hasher::new();
    output.update(&block);
    output.finalize_xof().fill(&mut key);
    Ok(key)
}

/// The callback-style platform surface.
///
/// Dispatches the blocking derivation to the runtime's blocking thread pool
/// and invokes `callback` exactly once with the result. Must be called from
/// within a tokio runtime.
pub fn derive_key_callback<F>(req: KdfRequest, callback: F)
where
    F: FnOnce(Result<Vec<u8>, KdfError>) + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        callback(derive_key_blocking(&req));
    });
}

/// Truncated blake3 hex digest used by mismatch records.
pub fn short_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex()[..16].to_string()
}
