//! The session lifecycle state machine: the single writer of [`AuthState`],
//! the initial reconciliation sequence, the provisioning retry policy, the
//! keep-alive loop and the loading-timeout safeguard.

mod controller;
mod sleeper;
mod state;


pub use controller::SessionController;
pub use sleeper::{Sleeper, TokioSleeper};
pub use state::{AuthPhase, AuthState, AuthStateCell};
