use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who the session is talking to.
///
/// `Standard` is the Spanish-speaking parent/child experience; `Developer` is the
/// English diagnostic mode with structured answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Standard,
    Developer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    Spanish,
    English,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Standard => "standard",
            Mode::Developer => "developer",
        }
    }

    pub fn is_developer(&self) -> bool {
        matches!(self, Mode::Developer)
    }

    pub fn locale(&self) -> Locale {
        match self {
            Mode::Standard => Locale::Spanish,
            Mode::Developer => Locale::English,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown mode '{0}', expected 'standard' or 'developer'")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "user" => Ok(Mode::Standard),
            "developer" | "dev" => Ok(Mode::Developer),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names_case_insensitively() {
        assert_eq!("Developer".parse::<Mode>().unwrap(), Mode::Developer);
        assert_eq!("user".parse::<Mode>().unwrap(), Mode::Standard);
        assert!("tutor".parse::<Mode>().is_err());
    }
}
