//! Services used by the HTTP handlers.

pub mod accounts;
pub mod ephemeral;
pub mod mailer;
pub mod sweeper;

pub use accounts::AccountService;
pub use ephemeral::{EphemeralStore, StoreBackend};
pub use mailer::{Email, HttpMailer, LogMailer, Mailer};
pub use sweeper::spawn_session_sweeper;
