//! Fixed-width routing identifiers.
//!
//! Services and methods are addressed by opaque 3-byte tokens. Equality and
//! hashing are byte-exact; the display form is lowercase hex.

use crate::error::ProtocolError;
use std::fmt;

/// Width of a service or method identifier in bytes.
pub const ID_LEN: usize = 3;

macro_rules! routing_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LEN]);

        impl $name {
            /// Creates an identifier from its raw bytes.
            pub const fn new(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            /// Parses an identifier from a slice of exactly `ID_LEN` bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
                let raw: [u8; ID_LEN] =
                    bytes
                        .try_into()
                        .map_err(|_| ProtocolError::InvalidIdLength {
                            expected: ID_LEN,
                            actual: bytes.len(),
                        })?;
                Ok(Self(raw))
            }

            /// Returns the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    };
}

routing_id! {
    /// Identifies a registered service.
    ServiceId
}

routing_id! {
    /// Identifies a method within one service's namespace.
    MethodId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_is_hex() {
        assert_eq!(ServiceId::new([0x01, 0x00, 0xff]).to_string(), "0100ff");
        assert_eq!(MethodId::new([0x00, 0x00, 0x01]).to_string(), "000001");
    }

    #[test]
    fn test_from_slice() {
        let id = ServiceId::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(id.as_bytes(), &[1, 2, 3]);

        let result = MethodId::from_slice(&[1, 2]);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidIdLength {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_byte_exact_equality() {
        let mut set = HashSet::new();
        set.insert(ServiceId::new([1, 0, 0]));
        assert!(set.contains(&ServiceId::from([1, 0, 0])));
        assert!(!set.contains(&ServiceId::new([0, 0, 1])));
    }
}
