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

//! Packet protection primitives.
//!
//! [`PacketKey`] performs the AEAD transform over packet payloads and
//! [`HeaderKey`] masks the protected header fields. Both are bound to a
//! single key for their whole lifetime; a key update is performed by
//! constructing new instances from the updated secrets.

use ring::aead;
use ring::aead::LessSafeKey;
use ring::aead::UnboundKey;
use strum_macros::EnumIter;

use crate::Error;
use crate::Result;
use crate::MAX_PACKET_SIZE;

/// The most significant bit (0x80) of the first byte is set to 1 for
/// packets that use the long header.
const HEADER_LONG_FORM_BIT: u8 = 0x80;

/// In packets that contain a Packet Number field, the least significant
/// two bits of the first byte contain the length of that field.
const PKT_NUM_LEN_MASK: u8 = 0x03;

/// The packet number field is 1 to 4 bytes long.
const MAX_PKT_NUM_LEN: usize = 4;

/// The cipher suites usable for QUIC v1 packet protection have 16-byte
/// expansions and 16-byte header protection samples.
const SAMPLE_LEN: usize = 16;

fn long_header(first: u8) -> bool {
    first & HEADER_LONG_FORM_BIT != 0
}

/// AEAD algorithm used for packet protection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum Algorithm {
    Aes128Gcm,
    Aes256Gcm,
    Aes128Ccm,
    ChaCha20Poly1305,
}

impl Algorithm {
    /// The key length.
    pub fn key_len(self) -> usize {
        match self {
            Algorithm::Aes128Gcm => 16,
            Algorithm::Aes256Gcm => 32,
            Algorithm::Aes128Ccm => 16,
            Algorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// The length of AEAD tag.
    pub fn tag_len(self) -> usize {
        match self {
            Algorithm::Aes128Gcm => 16,
            Algorithm::Aes256Gcm => 16,
            Algorithm::Aes128Ccm => 16,
            Algorithm::ChaCha20Poly1305 => 16,
        }
    }

    /// The length of AEAD nonce.
    pub fn nonce_len(self) -> usize {
        match self {
            Algorithm::Aes128Gcm => 12,
            Algorithm::Aes256Gcm => 12,
            Algorithm::Aes128Ccm => 12,
            Algorithm::ChaCha20Poly1305 => 12,
        }
    }

    /// The AEAD algorithm of the cryptographic backend.
    fn aead_algor(self) -> Result<&'static aead::Algorithm> {
        match self {
            Algorithm::Aes128Gcm => Ok(&aead::AES_128_GCM),
            Algorithm::Aes256Gcm => Ok(&aead::AES_256_GCM),
            Algorithm::ChaCha20Poly1305 => Ok(&aead::CHACHA20_POLY1305),
            // AEAD_AES_128_CCM is a registered suite for QUIC v1 but is
            // not provided by the backend.
            Algorithm::Aes128Ccm => Err(Error::UnsupportedCipher),
        }
    }

    /// The algorithm of header protection.
    ///
    /// ChaCha20-Poly1305 masks with raw ChaCha20 keystream seeded by the
    /// sample; the AES suites encrypt the sample as a single block. The
    /// strategy is fixed here, at construction time.
    fn hp_algor(self) -> Result<&'static aead::quic::Algorithm> {
        match self {
            Algorithm::Aes128Gcm => Ok(&aead::quic::AES_128),
            Algorithm::Aes256Gcm => Ok(&aead::quic::AES_256),
            Algorithm::ChaCha20Poly1305 => Ok(&aead::quic::CHACHA20),
            Algorithm::Aes128Ccm => Err(Error::UnsupportedCipher),
        }
    }
}

// Derive the nonce for a single packet by folding the encoded packet
// number at the tail of the packet header into the low-order bytes of the
// static IV.
//
// The two least significant bits of the first header byte carry
// `packet number length - 1`. The derivation is repeated for every packet
// and must never be cached: the resulting nonce is unique only because
// packet numbers do not repeat within an epoch.
fn derive_nonce(iv: &[u8], ad: &[u8]) -> Result<[u8; aead::NONCE_LEN]> {
    if iv.len() < aead::NONCE_LEN || ad.is_empty() {
        return Err(Error::CryptoFail);
    }
    let pkt_num_len = usize::from((ad[0] & PKT_NUM_LEN_MASK) + 1);
    if ad.len() < pkt_num_len {
        return Err(Error::CryptoFail);
    }

    let mut nonce = [0; aead::NONCE_LEN];
    nonce.copy_from_slice(&iv[..aead::NONCE_LEN]);
    for i in 1..=pkt_num_len {
        nonce[aead::NONCE_LEN - i] ^= ad[ad.len() - i];
    }

    Ok(nonce)
}

/// AEAD protection of packet payloads for one encryption epoch and
/// direction.
///
/// A `PacketKey` owns two independent cipher states bound to the same key:
/// one used only by [`seal`], one used only by [`open`]. The key is fixed
/// at construction and never changes; a key update constructs a new
/// instance.
///
/// Both operations write into a scratch buffer owned by the instance and
/// reused across calls, which is why they take `&mut self`: calls on one
/// instance must be serialized by the caller. Distinct instances share no
/// state and may be used in parallel.
///
/// [`seal`]: Self::seal
/// [`open`]: Self::open
pub struct PacketKey {
    algor: Algorithm,
    sealer: LessSafeKey,
    opener: LessSafeKey,
    buf: Box<[u8]>,
}

impl PacketKey {
    /// Create a new `PacketKey` bound to the given key.
    pub fn new(algor: Algorithm, key: &[u8]) -> Result<Self> {
        let aead_algor = algor.aead_algor()?;
        if key.len() != algor.key_len() {
            return Err(Error::InvalidKeyLength);
        }

        let sealer = UnboundKey::new(aead_algor, key).map_err(|_| Error::CryptoFail)?;
        let opener = UnboundKey::new(aead_algor, key).map_err(|_| Error::CryptoFail)?;
        Ok(Self {
            algor,
            sealer: LessSafeKey::new(sealer),
            opener: LessSafeKey::new(opener),
            buf: vec![0; MAX_PACKET_SIZE].into_boxed_slice(),
        })
    }

    /// Encrypt and authenticate `plaintext` with `ad` as associated data.
    ///
    /// The `iv` is the static per-epoch IV derived by the key schedule; it
    /// is combined with the encoded packet number at the tail of `ad` (the
    /// packet header) to form the per-packet nonce.
    ///
    /// Returns `plaintext.len()` bytes of ciphertext followed by the
    /// 16-byte authentication tag. The slice borrows the internal scratch
    /// buffer and is valid until the next call on this instance.
    /// See RFC 9001 Section 5.3
    pub fn seal(&mut self, iv: &[u8], plaintext: &[u8], ad: &[u8]) -> Result<&[u8]> {
        let out_len = plaintext.len() + self.algor.tag_len();
        if out_len > self.buf.len() {
            return Err(Error::BufferTooShort);
        }

        let nonce = aead::Nonce::assume_unique_for_key(derive_nonce(iv, ad)?);
        let in_out = &mut self.buf[..plaintext.len()];
        in_out.copy_from_slice(plaintext);

        let tag = self
            .sealer
            .seal_in_place_separate_tag(nonce, aead::Aad::from(ad), in_out)
            .map_err(|_| Error::CryptoFail)?;
        self.buf[plaintext.len()..out_len].copy_from_slice(tag.as_ref());

        Ok(&self.buf[..out_len])
    }

    /// Verify and decrypt `data`, the ciphertext followed by the 16-byte
    /// authentication tag, with `ad` as associated data.
    ///
    /// On [`Error::AuthenticationFailure`] no plaintext is exposed and the
    /// caller must drop the packet. The returned slice borrows the
    /// internal scratch buffer and is valid until the next call on this
    /// instance.
    pub fn open(&mut self, iv: &[u8], data: &[u8], ad: &[u8]) -> Result<&[u8]> {
        // A buffer shorter than the tag cannot authenticate. Fail before
        // reaching the cipher.
        if data.len() < self.algor.tag_len() {
            return Err(Error::AuthenticationFailure);
        }
        if data.len() > self.buf.len() {
            return Err(Error::BufferTooShort);
        }

        let nonce = aead::Nonce::assume_unique_for_key(derive_nonce(iv, ad)?);
        let in_out = &mut self.buf[..data.len()];
        in_out.copy_from_slice(data);

        let plaintext_len = self
            .opener
            .open_in_place(nonce, aead::Aad::from(ad), in_out)
            .map_err(|_| Error::AuthenticationFailure)?
            .len();

        Ok(&self.buf[..plaintext_len])
    }

    /// Return the AEAD algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algor
    }
}

/// Header protection for one encryption epoch and direction.
///
/// A 5-byte mask is derived from a 16-byte sample of the AEAD-protected
/// payload and XORed onto the protected bits of the first header byte and
/// the packet number field. The masking key and strategy are fixed at
/// construction.
///
/// [`apply`] and [`remove`] write into a scratch buffer owned by the
/// instance, so calls on one instance must be serialized by the caller.
///
/// [`apply`]: Self::apply
/// [`remove`]: Self::remove
pub struct HeaderKey {
    key: aead::quic::HeaderProtectionKey,
    buf: Box<[u8]>,
}

impl HeaderKey {
    /// Create a new `HeaderKey` bound to the given masking key.
    pub fn new(algor: Algorithm, key: &[u8]) -> Result<Self> {
        let hp_algor = algor.hp_algor()?;
        if key.len() != algor.key_len() {
            return Err(Error::InvalidKeyLength);
        }

        Ok(Self {
            key: aead::quic::HeaderProtectionKey::new(hp_algor, key)
                .map_err(|_| Error::CryptoFail)?,
            buf: vec![0; MAX_PACKET_SIZE].into_boxed_slice(),
        })
    }

    // 5-byte mask from a 16-byte ciphertext sample. Pure function of the
    // fixed key and the sample.
    fn new_mask(&self, sample: &[u8]) -> Result<[u8; 5]> {
        self.key.new_mask(sample).map_err(|_| Error::CryptoFail)
    }

    /// Apply header protection over the plaintext `header` and the
    /// AEAD-protected `payload`, returning the full protected packet.
    ///
    /// The sample of ciphertext is taken starting from an offset of 4
    /// bytes after the start of the Packet Number field, which sits at the
    /// tail of `header`. The four least significant bits of the first byte
    /// are masked for long header packets, the five least significant bits
    /// for short header packets, then the packet number bytes are masked.
    ///
    /// The returned slice borrows the internal scratch buffer and is valid
    /// until the next call on this instance.
    /// See RFC 9001 Section 5.4.1
    pub fn apply(&mut self, header: &[u8], payload: &[u8]) -> Result<&[u8]> {
        if header.is_empty() {
            return Err(Error::BufferTooShort);
        }
        let pkt_num_len = usize::from((header[0] & PKT_NUM_LEN_MASK) + 1);
        if header.len() < pkt_num_len {
            return Err(Error::BufferTooShort);
        }

        let sample_start = MAX_PKT_NUM_LEN - pkt_num_len;
        if payload.len() < sample_start + SAMPLE_LEN {
            return Err(Error::BufferTooShort);
        }
        let pkt_len = header.len() + payload.len();
        if pkt_len > self.buf.len() {
            return Err(Error::BufferTooShort);
        }

        let mask = self.new_mask(&payload[sample_start..sample_start + SAMPLE_LEN])?;

        self.buf[..header.len()].copy_from_slice(header);
        self.buf[header.len()..pkt_len].copy_from_slice(payload);

        if long_header(self.buf[0]) {
            self.buf[0] ^= mask[0] & 0x0f;
        } else {
            self.buf[0] ^= mask[0] & 0x1f;
        }

        // The Packet Number field is the last field of the header.
        let pn_offset = header.len() - pkt_num_len;
        for i in 0..pkt_num_len {
            self.buf[pn_offset + i] ^= mask[i + 1];
        }

        Ok(&self.buf[..pkt_len])
    }

    /// Remove header protection from the received packet `pkt`.
    ///
    /// `pn_offset` is the offset of the Packet Number field, known to the
    /// caller from parsing the unprotected portion of the header. The
    /// sample is taken assuming the maximum 4-byte packet number encoding,
    /// since the actual length is itself protected; the true length is
    /// read from the first byte only after that byte has been unmasked.
    ///
    /// Returns the unprotected packet prefix, up to and including the
    /// packet number field. The still-protected payload stays in `pkt` and
    /// is opened separately by the caller.
    /// See RFC 9001 Section 5.4.1
    pub fn remove(&mut self, pkt: &[u8], pn_offset: usize) -> Result<&[u8]> {
        if pkt.len() < pn_offset + MAX_PKT_NUM_LEN + SAMPLE_LEN {
            return Err(Error::BufferTooShort);
        }

        let sample_start = pn_offset + MAX_PKT_NUM_LEN;
        let mask = self.new_mask(&pkt[sample_start..sample_start + SAMPLE_LEN])?;

        let prefix = &mut self.buf[..pn_offset + MAX_PKT_NUM_LEN];
        prefix.copy_from_slice(&pkt[..pn_offset + MAX_PKT_NUM_LEN]);

        if long_header(prefix[0]) {
            prefix[0] ^= mask[0] & 0x0f;
        } else {
            prefix[0] ^= mask[0] & 0x1f;
        }

        // Only the unmasked first byte carries the true length of the
        // packet number field.
        let pkt_num_len = usize::from((prefix[0] & PKT_NUM_LEN_MASK) + 1);
        for i in 0..pkt_num_len {
            prefix[pn_offset + i] ^= mask[i + 1];
        }

        Ok(&self.buf[..pn_offset + pkt_num_len])
    }
}
