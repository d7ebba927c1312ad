//! Session management for the proxy
//!
//! Each caller identity maps to one session holding its own provider cookie
//! jar and the cached mailbox lease. The `SessionStore` trait is the seam
//! for storage backends; `sweeper` evicts sessions past their TTL.

pub mod adapters;
pub mod store;
pub mod sweeper;

pub use adapters::InMemorySessionStore;
pub use store::{MailboxLease, Session, SessionStore, SessionStoreError, SessionStoreRef};
pub use sweeper::{spawn_sweeper, SweeperHandle};
