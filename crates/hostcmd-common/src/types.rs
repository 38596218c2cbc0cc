// ============================================
// File: crates/hostcmd-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Main Functionality
//! - `CommandName`: Name of a host command as carried in an envelope
//! - Well-known command name constants shared by signer and agent
//!
//! ## ⚠️ Important Note for Next Developer
//! - A `CommandName` is only a label. Whether a name is executable is decided
//!   by the agent's whitelist, never by this type.
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reboots the host.
pub const REBOOT: &str = "reboot";

/// Powers the host off.
pub const SHUTDOWN: &str = "shutdown";

/// Re-discovers the host's network addresses.
pub const SET_IP_ADDRESSES: &str = "set_ip_addresses";

/// Name of a host command.
///
/// # Example
/// ```
/// use hostcmd_common::types::CommandName;
///
/// let cmd = CommandName::new("reboot");
/// assert_eq!(cmd.as_str(), "reboot");
/// assert_eq!(cmd, "reboot");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandName(String);

impl CommandName {
    /// Wraps a command name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for CommandName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for CommandName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CommandName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name_display() {
        let cmd = CommandName::new(REBOOT);
        assert_eq!(cmd.to_string(), "reboot");
        assert_eq!(cmd.as_ref(), "reboot");
    }

    #[test]
    fn test_command_name_comparisons() {
        let cmd: CommandName = "shutdown".into();
        assert_eq!(cmd, SHUTDOWN);
        assert_ne!(cmd, REBOOT);
        assert_eq!(cmd.into_inner(), "shutdown");
    }
}
