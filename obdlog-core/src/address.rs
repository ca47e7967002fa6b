//! Bluetooth Classic device addresses.

use std::fmt;
use std::str::FromStr;

use crate::error::ObdError;

/// Six-byte Bluetooth device address, parsed from the usual
/// `AA:BB:CC:DD:EE:FF` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for BdAddr {
    type Err = ObdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut groups = 0;
        for (i, group) in s.split(':').enumerate() {
            if i >= 6 || group.len() != 2 {
                return Err(ObdError::InvalidArgument(format!(
                    "invalid adapter address {s:?}"
                )));
            }
            bytes[i] = u8::from_str_radix(group, 16).map_err(|_| {
                ObdError::InvalidArgument(format!("invalid adapter address {s:?}"))
            })?;
            groups = i + 1;
        }
        if groups != 6 {
            return Err(ObdError::InvalidArgument(format!(
                "invalid adapter address {s:?}"
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}
