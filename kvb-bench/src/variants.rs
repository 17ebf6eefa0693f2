//! The three asynchronous wrapping styles under comparison.
//!
//! All three funnel into the identical callback-style primitive with the same
//! argument positions, the same options bag, and the same error propagation;
//! for identical inputs they must produce byte-identical output. They differ
//! only in how the callback is adapted into a future:
//!
//! 1. [`VariantKind::Callback`] bridges the callback at the call site with a
//!    oneshot channel.
//! 2. [`VariantKind::Promisified`] runs the same primitive through the
//!    generic [`promisify`] combinator.
//! 3. [`VariantKind::ManualFuture`] completes a hand-implemented [`Future`]
//!    from the callback.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use kvb_common::{KdfError, VariantKind};
use tokio::sync::oneshot;

use crate::kdf::{self, KdfRequest};

/// Future type produced by every wrapping style.
pub type KdfFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, KdfError>> + Send>>;

/// Uniform invocation seam over the wrapping styles.
///
/// The batch runner only sees this trait, which is also the fault-injection
/// seam the scenario tests use to exercise failure, mismatch, and timeout
/// paths without touching the real primitive.
pub trait VariantDriver: Send + Sync {
    /// Start one derivation. Work begins immediately; the returned future
    /// resolves exactly once.
    fn invoke(&self, req: KdfRequest) -> KdfFuture;
}

impl VariantDriver for VariantKind {
    fn invoke(&self, req: KdfRequest) -> KdfFuture {
        match self {
            VariantKind::Callback => invoke_callback(req),
            VariantKind::Promisified => promisify(move |cb| kdf::derive_key_callback(req, cb)),
            VariantKind::ManualFuture => invoke_manual(req),
        }
    }
}

/// Style 1: raw callback invocation adapted into a single-resolution future
/// at the call site.
fn invoke_callback(req: KdfRequest) -> KdfFuture {
    let (tx, rx) = oneshot::channel();
    kdf::derive_key_callback(req, move |result| {
        // The receiver may have been abandoned by a timeout; nothing to do.
        let _ = tx.send(result);
    });
    Box::pin(async move {
        rx.await
            .unwrap_or_else(|_| Err(KdfError::new("callback dropped without completing")))
    })
}

/// Style 2: a generic combinator turning any callback-style starter into a
/// future. The starter receives the completion callback and must invoke it
/// exactly once.
pub fn promisify<F>(start: F) -> KdfFuture
where
    F: FnOnce(Box<dyn FnOnce(Result<Vec<u8>, KdfError>) + Send>) + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    start(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    Box::pin(async move {
        rx.await
            .unwrap_or_else(|_| Err(KdfError::new("callback dropped without completing")))
    })
}

#[derive(Default)]
struct ManualState {
    result: Option<Result<Vec<u8>, KdfError>>,
    waker: Option<Waker>,
}

/// Style 3: a hand-implemented future completed by the callback.
struct ManualKdfFuture {
    state: Arc<Mutex<ManualState>>,
}

impl Future for ManualKdfFuture {
    type Output = Result<Vec<u8>, KdfError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock().expect("manual future state lock");
        if let Some(result) = state.result.take() {
            Poll::Ready(result)
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

fn invoke_manual(req: KdfRequest) -> KdfFuture {
    let state = Arc::new(Mutex::new(ManualState::default()));
    let completion = state.clone();
    kdf::derive_key_callback(req, move |result| {
        let waker = {
            let mut slot = completion.lock().expect("manual future state lock");
            slot.result = Some(result);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    });
    Box::pin(ManualKdfFuture { state })
}
