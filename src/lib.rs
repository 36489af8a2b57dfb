//! kdpassd - a small secure-transport server.
//!
//! A connection starts with a fixed handshake: the server presents a root and
//! a leaf certificate, the client answers with a session key encrypted to the
//! leaf certificate's RSA key, and every message after that travels as an
//! AES-256-CTR Record (`IV || ciphertext`).
//!
//! - [`tcp_server`] accepts connections and hands each to a
//!   [`connection_worker::ConnectionWorker`].
//! - [`handshake`] drives the server side of the handshake.
//! - [`crypto`] holds the session key transport and the record cipher.
//! - [`app_handler`] is the seam where decrypted messages meet application
//!   logic.
//! - [`client`] is the matching client side.

pub mod app_handler;
pub mod async_stream;
pub mod bundle;
pub mod client;
pub mod config;
pub mod connection_worker;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod tcp_server;
pub mod util;
