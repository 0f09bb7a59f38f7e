//! IMAP connection plumbing: plaintext/TLS streams and response framing.

mod framed;
mod stream;

pub use framed::FramedStream;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};
