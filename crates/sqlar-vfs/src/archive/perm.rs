//! Permission policy.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Selects which permission triads are honored.
///
/// A node is readable (traversable, for directories) if any read (execute)
/// bit survives the mask.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermMask {
    /// Owner bits only (`0o700`).
    Owner,
    /// Group bits only (`0o070`).
    Group,
    /// Other bits only (`0o007`).
    #[serde(alias = "others")]
    #[strum(to_string = "other", serialize = "others")]
    Other,
    /// Any triad (`0o777`).
    #[default]
    Any,
}

impl PermMask {
    /// Numeric mask over the permission triad.
    pub fn bits(self) -> u32 {
        match self {
            PermMask::Owner => 0o700,
            PermMask::Group => 0o070,
            PermMask::Other => 0o007,
            PermMask::Any => 0o777,
        }
    }

    /// Inverse of [`bits`](Self::bits). Any other value is refused.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0o700 => Some(PermMask::Owner),
            0o070 => Some(PermMask::Group),
            0o007 => Some(PermMask::Other),
            0o777 => Some(PermMask::Any),
            _ => None,
        }
    }

    /// Any read bit surviving the mask.
    pub fn can_read(self, mode: u32) -> bool {
        mode & 0o444 & self.bits() != 0
    }

    /// Any execute bit surviving the mask.
    pub fn can_traverse(self, mode: u32) -> bool {
        mode & 0o111 & self.bits() != 0
    }
}
