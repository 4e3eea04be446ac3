//! Language tags and the policies derived from them.

use std::fmt;

/// Which instruction set to use when talking to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    English,
    Chinese,
}

/// A BCP-47-ish language tag such as `en`, `zh` or `zh-TW`.
///
/// Tags compare by their exact text; only the primary subtag is used to
/// pick segmentation and prompting policies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language(String);

impl Language {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn primary_subtag(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase()
    }

    /// Chinese, Japanese and Korean text is segmented on ideographic
    /// punctuation rather than on whitespace.
    pub fn is_cjk(&self) -> bool {
        matches!(self.primary_subtag().as_str(), "zh" | "ja" | "ko")
    }

    pub fn is_english(&self) -> bool {
        self.primary_subtag() == "en"
    }

    pub fn locale(&self) -> Locale {
        if self.primary_subtag() == "zh" {
            Locale::Chinese
        } else {
            Locale::English
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Language {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}
