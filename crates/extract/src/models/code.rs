use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::consts::CODE_REGEX;
use crate::error::{Error, ErrorKind, Result};

/// A normalized title identifier such as `ABC-123`.
///
/// Only ever constructed through validation, so holding a `Code` means the
/// value is uppercase letters (2–6), a hyphen, and digits (2–5).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code(String);
impl Code {
    /// Validates an already-normalized code (surrounding whitespace is
    /// ignored, case is not).
    pub fn parse(s: impl AsRef<str>) -> Result<Self> {
        let s = s.as_ref().trim();
        if !CODE_REGEX.is_match(s) {
            exn::bail!(ErrorKind::InvalidCode(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl FromStr for Code {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
