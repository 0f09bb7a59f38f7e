//! # mailwarm-imap
//!
//! A small async IMAP4rev1 client covering what an engagement simulator
//! needs from a mailbox: log in, select a folder, find unseen messages, read
//! their envelope headers without setting `\Seen`, and add flags.
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//!        │                                                        │
//!        └── starttls() (plain streams only)          logout() ←──┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use mailwarm_imap::{Client, Flag};
//! use mailwarm_imap::connection::connect_tls;
//!
//! let stream = connect_tls("imap.example.com", 993).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.login("user@example.com", "secret").await?;
//! let (mut client, _exists) = client.select("INBOX").await?;
//!
//! let unseen = client.uid_search("UNSEEN").await?;
//! for message in client.uid_fetch_headers(&unseen).await? {
//!     client.uid_add_flags(message.uid, &[Flag::Seen]).await?;
//! }
//! client.logout().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod command;
pub mod connection;
mod error;
pub mod header;
pub mod response;
pub mod types;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use error::{Error, Result};
pub use header::HeaderFields;
pub use types::{Flag, MessageHeaders, Uid};
