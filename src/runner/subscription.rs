use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::RunError;
use super::options::RunOptions;
use crate::prelude::*;

/// The run's view of its cancellation context.
///
/// Holds a child of the caller's token, so a configured signal only cancels
/// this run and never the caller's token.
pub(crate) struct CancelSubscription {
    token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl CancelSubscription {
    /// Must be called before the first read so that no interrupt is missed.
    pub(crate) fn install(options: &RunOptions) -> Result<Self, RunError> {
        let token = options.cancellation.child_token();
        let listener = match options.cancel_signal {
            Some(sig) => Some(listen(sig, token.clone())?),
            None => None,
        };
        Ok(Self { token, listener })
    }

    pub(crate) async fn requested(&self) {
        self.token.cancelled().await
    }
}

impl Drop for CancelSubscription {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

fn listen(sig: Signal, token: CancellationToken) -> Result<JoinHandle<()>, RunError> {
    let mut stream = signal(SignalKind::from_raw(sig as i32))
        .map_err(|source| RunError::SignalListener { signal: sig, source })?;

    Ok(tokio::spawn(async move {
        while stream.recv().await.is_some() {
            debug!("Received {sig:?}, cancelling");
            token.cancel();
        }
    }))
}
