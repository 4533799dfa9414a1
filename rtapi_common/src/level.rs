//! Message verbosity levels.
//!
//! A message passes the filter when its level is numerically less than or
//! equal to the current threshold, and the threshold is not `None`.

use crate::error::{RtapiError, RtapiResult};
use serde::{Deserialize, Serialize};

/// Verbosity level attached to every deferred message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MsgLevel {
    /// Suppress everything.
    None = 0,
    /// Errors only.
    Err = 1,
    /// Errors and warnings.
    Warn = 2,
    /// Normal operational messages.
    #[default]
    Info = 3,
    /// Debug output.
    Dbg = 4,
    /// Unconditional output (`print`).
    All = 5,
}

impl MsgLevel {
    /// Convert from the raw byte stored in a message record.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Err),
            2 => Some(Self::Warn),
            3 => Some(Self::Info),
            4 => Some(Self::Dbg),
            5 => Some(Self::All),
            _ => None,
        }
    }

    /// Whether a message at `level` is printed under this threshold.
    #[inline]
    pub fn passes(self, level: MsgLevel) -> bool {
        self != MsgLevel::None && level <= self
    }
}

impl TryFrom<i32> for MsgLevel {
    type Error = RtapiError;

    fn try_from(value: i32) -> RtapiResult<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_u8)
            .ok_or(RtapiError::InvalidArgument("message level out of range"))
    }
}
