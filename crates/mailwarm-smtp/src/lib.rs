//! # mailwarm-smtp
//!
//! A small async SMTP submission client (RFC 5321) covering exactly what a
//! warm-up sender needs: greeting, EHLO, STARTTLS, AUTH PLAIN, a single
//! envelope with one or more recipients, DATA and QUIT.
//!
//! ## Connection States
//!
//! The client uses the type-state pattern so that only valid commands can be
//! issued in each phase of the session:
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated ── mail_from() ──→ Envelope
//!     │                                                              │
//!     └──────────────── mail_from() ─────────────────────────────────┤
//!                                                                    │
//!                 Authenticated ←── send_data() ←── rcpt_to() ───────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use mailwarm_smtp::{Address, Client};
//! use mailwarm_smtp::connection::connect;
//!
//! let stream = connect("smtp.example.com", 587).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("warm.example.com").await?;
//! let client = client.starttls("smtp.example.com").await?;
//! let client = client.auth_plain("user@example.com", "secret").await?;
//!
//! let client = client
//!     .mail_from(Address::new("user@example.com")?)
//!     .await?
//!     .rcpt_to(Address::new("peer@example.org")?)
//!     .await?
//!     .send_data(b"Subject: hi\r\n\r\nhello\r\n")
//!     .await?;
//! client.quit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Connected, Envelope, ServerInfo, SmtpStream};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
