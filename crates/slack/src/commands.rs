use std::collections::HashMap;

use thiserror::Error;

/// A templated text trigger: a literal prefix followed by exactly one named
/// `<placeholder>` that captures the rest of the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPattern {
    raw: String,
    prefix: String,
    placeholder: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("command pattern `{0}` has no `<placeholder>`")]
    MissingPlaceholder(String),
    #[error("command pattern `{0}` has more than one `<placeholder>`")]
    MultiplePlaceholders(String),
    #[error("command pattern `{0}` has an unterminated `<placeholder>`")]
    UnterminatedPlaceholder(String),
    #[error("command pattern `{0}` has literal text after the `<placeholder>`")]
    TrailingLiteral(String),
    #[error("command pattern `{0}` has an empty placeholder name")]
    EmptyPlaceholderName(String),
}

impl CommandPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let open = match raw.find('<') {
            Some(index) => index,
            None => return Err(PatternError::MissingPlaceholder(raw.to_owned())),
        };
        let close = match raw[open..].find('>') {
            Some(offset) => open + offset,
            None => return Err(PatternError::UnterminatedPlaceholder(raw.to_owned())),
        };

        let placeholder = raw[open + 1..close].trim();
        if placeholder.is_empty() {
            return Err(PatternError::EmptyPlaceholderName(raw.to_owned()));
        }
        if raw[close + 1..].contains('<') || raw[open + 1..].contains('<') {
            return Err(PatternError::MultiplePlaceholders(raw.to_owned()));
        }
        if !raw[close + 1..].trim().is_empty() {
            return Err(PatternError::TrailingLiteral(raw.to_owned()));
        }

        Ok(Self {
            raw: raw.to_owned(),
            prefix: raw[..open].to_owned(),
            placeholder: placeholder.to_owned(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Matches an inbound message against the pattern, binding the text after
    /// the literal prefix to the placeholder name. Returns `None` when the
    /// prefix does not match.
    pub fn bind(&self, text: &str) -> Option<HashMap<String, String>> {
        let trimmed = text.trim();
        let remainder = trimmed.strip_prefix(self.prefix.trim_end())?;
        // A prefix ending in whitespace must be followed by whitespace or
        // nothing, so `query for bot - x` does not match `query for bot -x...`
        // against an unrelated prefix.
        let value = if self.prefix.ends_with(char::is_whitespace) {
            if !remainder.is_empty() && !remainder.starts_with(char::is_whitespace) {
                return None;
            }
            remainder.trim_start()
        } else {
            remainder.trim_start()
        };

        let mut params = HashMap::new();
        params.insert(self.placeholder.clone(), value.to_owned());
        Some(params)
    }
}

/// A registered command: the pattern plus the human-readable description and
/// example surfaced in platform help.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub pattern: CommandPattern,
    pub description: String,
    pub example: String,
}

impl CommandDefinition {
    pub fn new(
        pattern: &str,
        description: impl Into<String>,
        example: impl Into<String>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: CommandPattern::parse(pattern)?,
            description: description.into(),
            example: example.into(),
        })
    }
}
