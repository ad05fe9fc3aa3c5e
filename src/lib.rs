// Copyright (c) 2024 The QUIC-PROTECT Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! QUIC-PROTECT implements the packet protection mechanisms of the
//! [IETF QUIC protocol](https://www.rfc-editor.org/rfc/rfc9001): AEAD
//! protection of packet payloads and header protection of the packet
//! number field and first-byte flag bits.
//!
//! The crate provides two independent primitives, created once per
//! encryption epoch and per direction from externally derived keys:
//!
//! * [`PacketKey`] seals and opens packet payloads. The per-packet nonce
//!   is derived from the static per-epoch IV and the encoded packet number
//!   carried at the tail of the packet header.
//! * [`HeaderKey`] applies and removes the header protection mask derived
//!   from a 16-byte sample of the protected payload.
//!
//! The [`packet`] module composes the two primitives into whole-packet
//! protect and unprotect operations.
//!
//! The TLS handshake, the key schedule deriving keys and IVs from traffic
//! secrets, packet assembly, and packet number reconstruction are the
//! caller's responsibility.
//!
//! ## Example
//!
//! ```
//! use quic_protect::Algorithm;
//! use quic_protect::HeaderKey;
//! use quic_protect::PacketKey;
//!
//! # fn main() -> quic_protect::Result<()> {
//! let key = [0x3a; 16];
//! let hp_key = [0x5c; 16];
//! let iv = [0x1f; 12];
//!
//! let mut packet_key = PacketKey::new(Algorithm::Aes128Gcm, &key)?;
//! let mut header_key = HeaderKey::new(Algorithm::Aes128Gcm, &hp_key)?;
//!
//! // A short header carrying a 1-byte packet number of zero.
//! let header = [0x40, 0x00];
//! let pkt = quic_protect::packet::encrypt_packet(
//!     &header,
//!     b"hello",
//!     &iv,
//!     &mut packet_key,
//!     &mut header_key,
//! )?;
//!
//! let (plain_header, payload) = quic_protect::packet::decrypt_packet(
//!     &pkt,
//!     1,
//!     &iv,
//!     &mut packet_key,
//!     &mut header_key,
//! )?;
//! assert_eq!(&plain_header[..], &header[..]);
//! assert_eq!(&payload[..], b"hello");
//! # Ok(())
//! # }
//! ```

/// The maximum size of a QUIC packet processed by the protectors.
///
/// Both protectors own a scratch buffer of this size that is reused across
/// calls instead of allocating per packet.
pub const MAX_PACKET_SIZE: usize = 1500;

/// A specialized [`Result`] type for packet protection operations.
///
/// [`Result`]: std::result::Result
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::crypto::Algorithm;
pub use crate::crypto::HeaderKey;
pub use crate::crypto::PacketKey;
pub use crate::error::Error;

pub mod crypto;
pub mod error;
pub mod packet;
