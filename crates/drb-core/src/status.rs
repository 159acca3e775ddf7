//! Human-readable status line surfaced to the reporting sink.

use std::fmt;

/// Last-write-wins diagnostic string. No history is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo(String);

impl StatusInfo {
    pub const OK: &'static str = "OK";

    pub fn set(&mut self, message: impl Into<String>) {
        self.0 = message.into();
    }

    pub fn set_ok(&mut self) {
        self.0 = Self::OK.to_string();
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == Self::OK
    }
}

impl Default for StatusInfo {
    fn default() -> Self {
        Self(Self::OK.to_string())
    }
}

impl fmt::Display for StatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut status = StatusInfo::default();
        assert!(status.is_ok());
        status.set("Error: first");
        status.set("Error: second");
        assert_eq!(status.as_str(), "Error: second");
        status.set_ok();
        assert!(status.is_ok());
    }
}
