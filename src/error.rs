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

//! Error type for packet protection operations.

use strum_macros::EnumIter;

/// Packet protection error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter)]
pub enum Error {
    /// The cipher suite is unknown or not provided by the cryptographic
    /// backend. The epoch must not be used.
    UnsupportedCipher,

    /// The key length does not match the requirement of the cipher suite.
    /// It indicates a bug in the caller's key schedule, not a network
    /// event.
    InvalidKeyLength,

    /// The authentication tag of a protected payload failed to verify.
    ///
    /// The offending packet must be dropped without emitting any recovered
    /// bytes. This error is expected in normal operation whenever a peer
    /// key mismatch, corrupted wire bytes, or a forgery produces a bad
    /// tag; it is not fatal to the connection by itself.
    AuthenticationFailure,

    /// The provided buffer is too short.
    BufferTooShort,

    /// A cryptographic operation failed unexpectedly. It signals a
    /// programming or environment error rather than corrupted input.
    CryptoFail,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn error_display() {
        for err in Error::iter() {
            assert_eq!(format!("{}", err), format!("{:?}", err));
            assert!(std::error::Error::source(&err).is_none());
        }
    }
}
