pub mod error;
pub mod http_server;
pub mod identity;
pub mod mailbox;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{MailboxError, MailboxResult};
pub use mailbox::{AddressResult, InboxResult, MailboxCache};
