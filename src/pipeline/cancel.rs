/*!
 * Run-level cooperative cancellation.
 *
 * A `CancelHandle` flips a watch channel; every `CancelToken` observes it.
 * Work checks the token between stages and races it against external calls.
 */

use std::sync::Arc;

use tokio::sync::watch;

/// Requests cancellation of a run
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

/// Observes cancellation of a run
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle/token pair
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (
        CancelHandle {
            sender: Arc::new(sender),
        },
        CancelToken { receiver },
    )
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Another token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is signalled; pends forever if it never is
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}
