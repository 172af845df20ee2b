//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile a route's path template (`/posts/{id}`) into an anchored pattern
//! - Test request paths against the compiled pattern
//!
//! # Design Decisions
//! - A `{name}` segment matches one non-empty run of ASCII alphanumerics
//! - Every other character is literal (regex metacharacters are escaped)
//! - Whole-path matching only: no prefix or partial matches
//! - Compiled matchers are immutable and shared across threads without locks

use regex::Regex;
use thiserror::Error;

/// Pattern substituted for every `{name}` parameter.
const PARAM_PATTERN: &str = "[0-9A-Za-z]+";

/// Error returned when a path template cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPatternError {
    #[error("path template is empty")]
    Empty,

    #[error("unbalanced `{{` at byte {position} in `{template}`")]
    UnclosedParameter { template: String, position: usize },

    #[error("unbalanced `}}` at byte {position} in `{template}`")]
    UnopenedParameter { template: String, position: usize },

    #[error("invalid parameter name `{name}` in `{template}`")]
    InvalidParameterName { template: String, name: String },

    #[error("failed to compile `{template}`: {reason}")]
    Regex { template: String, reason: String },
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    pattern: Regex,
}

impl PathMatcher {
    /// Compile a path template into an anchored matcher.
    pub fn compile(template: &str) -> Result<Self, InvalidPatternError> {
        if template.is_empty() {
            return Err(InvalidPatternError::Empty);
        }

        let mut source = String::with_capacity(template.len() + 16);
        source.push('^');

        let mut literal_start = 0;
        let mut chars = template.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '{' => {
                    source.push_str(&regex::escape(&template[literal_start..i]));
                    let close = template[i + 1..].find(&['{', '}'][..]).map(|off| i + 1 + off);
                    let close = match close {
                        Some(pos) if template.as_bytes()[pos] == b'}' => pos,
                        _ => {
                            return Err(InvalidPatternError::UnclosedParameter {
                                template: template.to_string(),
                                position: i,
                            })
                        }
                    };

                    let name = &template[i + 1..close];
                    if !is_valid_param_name(name) {
                        return Err(InvalidPatternError::InvalidParameterName {
                            template: template.to_string(),
                            name: name.to_string(),
                        });
                    }

                    source.push_str(PARAM_PATTERN);
                    literal_start = close + 1;
                    // Skip past the closing brace.
                    for (j, _) in chars.by_ref() {
                        if j == close {
                            break;
                        }
                    }
                }
                '}' => {
                    return Err(InvalidPatternError::UnopenedParameter {
                        template: template.to_string(),
                        position: i,
                    })
                }
                _ => {}
            }
        }
        source.push_str(&regex::escape(&template[literal_start..]));
        source.push('$');

        let pattern = Regex::new(&source).map_err(|e| InvalidPatternError::Regex {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            pattern,
        })
    }

    /// Returns true if the whole `path` matches this template.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The template this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }
}

fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
