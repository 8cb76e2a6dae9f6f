//! Ctrl+C routing.
//!
//! While a retry loop runs, Ctrl+C cancels it cooperatively; at any other time
//! it exits the process.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Exit code used when the user interrupts outside a retry loop.
const EXIT_INTERRUPTED: i32 = 130;

type Slot = Arc<Mutex<Option<CancellationToken>>>;

/// Sends Ctrl+C to the active retry loop, if any.
#[derive(Clone, Default)]
pub struct InterruptRouter {
    active: Slot,
}

impl InterruptRouter {
    /// Install the process-wide Ctrl+C listener.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn install() -> Self {
        let router = Self::default();
        let active = router.active.clone();

        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let token = active
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(token) = token {
                    debug!("Interrupt routed to retry loop");
                    token.cancel();
                } else {
                    eprintln!("\nCancelled by user.");
                    std::process::exit(EXIT_INTERRUPTED);
                }
            }
        });

        router
    }

    /// Route interrupts to `token` until the returned guard is dropped.
    #[must_use]
    pub fn route_to(&self, token: CancellationToken) -> RouteGuard {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        RouteGuard {
            active: self.active.clone(),
        }
    }

    /// Deliver an interrupt as if Ctrl+C had been pressed.
    ///
    /// Returns `false` if no retry loop was listening.
    pub fn interrupt(&self) -> bool {
        let token = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Clears the interrupt route on drop.
pub struct RouteGuard {
    active: Slot,
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_cancels_routed_token() {
        let router = InterruptRouter::default();
        let token = CancellationToken::new();

        let guard = router.route_to(token.clone());
        assert!(router.interrupt());
        assert!(token.is_cancelled());
        drop(guard);
    }

    #[test]
    fn test_guard_clears_route() {
        let router = InterruptRouter::default();
        let token = CancellationToken::new();

        drop(router.route_to(token.clone()));
        assert!(!router.interrupt());
        assert!(!token.is_cancelled());
    }
}
