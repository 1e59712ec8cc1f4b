// src/system/interrupt.rs

use crate::CancellationToken;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Creates a token in the "not cancelled" state.
pub fn new_token() -> CancellationToken {
    Arc::new(AtomicBool::new(false))
}

/// Returns `true` once an interrupt has been requested.
pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(Ordering::SeqCst)
}

/// Marks the token as cancelled.
pub fn cancel(token: &CancellationToken) {
    token.store(true, Ordering::SeqCst);
}

/// Spawns a task that flips `token` on the first Ctrl+C.
///
/// Only the control loop looks at the token; reader tasks end on their own once
/// their processes are gone. Later interrupts are absorbed by the same handler.
/// Must be called from within a tokio runtime.
pub fn listen_for_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::debug!("Interrupt received.");
                cancel(&token);
            }
            Err(e) => log::warn!("Could not listen for Ctrl+C: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let token = new_token();
        assert!(!is_cancelled(&token));
        cancel(&token);
        assert!(is_cancelled(&token));
        // Idempotent
        cancel(&token);
        assert!(is_cancelled(&token));
    }
}
