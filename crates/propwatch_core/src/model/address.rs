//! Postal address value used as property identity.
//!
//! # Invariants
//! - `PostCode` is stored uppercase with one space before the inward code.
//! - `Address` always has at least one non-blank line.
//! - Both values are immutable once constructed.

use crate::model::validation::ModelValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{1,2}[0-9][A-Z0-9]?[0-9][A-Z]{2}$").expect("valid postcode regex")
});

const INWARD_CODE_LEN: usize = 3;

/// Normalized postcode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostCode(String);

impl PostCode {
    /// Parses and normalizes a postcode (`cw39st` -> `CW3 9ST`).
    pub fn new(value: &str) -> Result<Self, ModelValidationError> {
        let compact = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        if !POSTCODE_RE.is_match(&compact) {
            return Err(ModelValidationError::InvalidPostCode(value.trim().to_string()));
        }
        let (outward, inward) = compact.split_at(compact.len() - INWARD_CODE_LEN);
        Ok(Self(format!("{outward} {inward}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PostCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postal address: ordered lines plus postcode.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    post_code: PostCode,
    lines: Vec<String>,
}

impl Address {
    /// Builds an address from a postcode and lines.
    ///
    /// Lines are trimmed and blank lines dropped.
    pub fn new<I, S>(post_code: PostCode, lines: I) -> Result<Self, ModelValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        if lines.is_empty() {
            return Err(ModelValidationError::EmptyAddress);
        }
        Ok(Self { post_code, lines })
    }

    /// Convenience constructor parsing the postcode text as well.
    pub fn parse<I, S>(post_code: &str, lines: I) -> Result<Self, ModelValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(PostCode::new(post_code)?, lines)
    }

    pub fn post_code(&self) -> &PostCode {
        &self.post_code
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.lines.join(", "), self.post_code)
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, PostCode};
    use crate::model::validation::ModelValidationError;

    #[test]
    fn postcode_is_normalized() {
        assert_eq!(PostCode::new(" cw39st ").unwrap().as_str(), "CW3 9ST");
        assert_eq!(PostCode::new("SW1A 1AA").unwrap().as_str(), "SW1A 1AA");
    }

    #[test]
    fn postcode_rejects_malformed_values() {
        let err = PostCode::new("12345").unwrap_err();
        assert_eq!(err, ModelValidationError::InvalidPostCode("12345".to_string()));
    }

    #[test]
    fn address_display_joins_lines_then_postcode() {
        let address =
            Address::parse("CW3 9ST", ["99 The Street", "The Town", " ", "The County"]).unwrap();
        assert_eq!(
            address.to_string(),
            "99 The Street, The Town, The County CW3 9ST"
        );
        assert_eq!(address.lines().len(), 3);
    }

    #[test]
    fn address_requires_a_line() {
        let err = Address::parse("CW3 9ST", ["  "]).unwrap_err();
        assert_eq!(err, ModelValidationError::EmptyAddress);
    }
}
