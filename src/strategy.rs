//! Validation strategies bound to each option.
//!
//! A strategy is a pure function of the raw external value (or its absence)
//! to an [`Outcome`]: set the destination key to a string, or remove it.

use regex::Regex;

use crate::error::StrategyError;

/// One accepted form in an allow-list. Always matched against the whole value.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact string equality.
    Literal(String),
    /// A regular expression. `compiled` is `source` anchored at both ends.
    Regex { source: String, compiled: Regex },
}

impl Pattern {
    fn regex(source: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex {
            compiled: Regex::new(&format!("^(?:{source})$"))?,
            source: source.to_string(),
        })
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Literal(s) => s == candidate,
            Pattern::Regex { compiled, .. } => compiled.is_match(candidate),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(s) | Pattern::Regex { source: s, .. } => s,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pattern::Literal(a), Pattern::Literal(b)) => a == b,
            (Pattern::Regex { source: a, .. }, Pattern::Regex { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Pattern {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList(Vec<Pattern>);

impl AllowList {
    /// Values must equal one of `values` exactly.
    pub fn literals(values: &[&str]) -> Self {
        Self(values.iter().map(|v| Pattern::Literal(v.to_string())).collect())
    }

    /// Values must fully match one of the regular expressions. Every pattern
    /// is compiled here, once.
    pub fn regexes(patterns: &[&str]) -> Result<Self, regex::Error> {
        patterns
            .iter()
            .map(|p| Pattern::regex(p))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0.iter().any(|p| p.matches(candidate))
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(Pattern::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parameters shared by the allow-list strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedParams {
    pub allowed: AllowList,
    /// Whether an unset value is acceptable.
    pub allow_empty: bool,
    /// Whether an empty result removes the destination key instead of
    /// writing an empty value.
    pub remove_if_empty: bool,
}

impl AllowedParams {
    /// Optional value, removed from the file when unset.
    pub fn new(allowed: AllowList) -> Self {
        Self {
            allowed,
            allow_empty: true,
            remove_if_empty: true,
        }
    }

    /// The value must be provided.
    pub fn required(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    /// Write an empty value rather than removing the key.
    pub fn keep_empty(mut self) -> Self {
        self.remove_if_empty = false;
        self
    }

    fn finish(&self, value: &str) -> Outcome {
        if value.is_empty() && self.remove_if_empty {
            Outcome::Remove
        } else {
            Outcome::Set(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// The whole value must match the allow-list.
    AllowedList(AllowedParams),
    /// A comma-separated list; every trimmed token must match the allow-list.
    /// The value is stored as given.
    MultiAllowedList(AllowedParams),
    /// Anything, including empty. Always sets.
    Any,
    /// Anything but empty. Always sets.
    NonEmpty,
    /// Set when present, remove when unset.
    NonEmptyOrRemove,
}

/// What an option does to its destination key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Set(String),
    Remove,
}

impl Strategy {
    /// Validate `raw` (absent or empty means unset) and decide the outcome.
    pub fn evaluate(&self, raw: Option<&str>) -> Result<Outcome, StrategyError> {
        let value = raw.filter(|v| !v.is_empty());

        match self {
            Strategy::Any => Ok(Outcome::Set(value.unwrap_or_default().to_string())),
            Strategy::NonEmpty => value
                .map(|v| Outcome::Set(v.to_string()))
                .ok_or(StrategyError::Unset),
            Strategy::NonEmptyOrRemove => {
                Ok(value.map_or(Outcome::Remove, |v| Outcome::Set(v.to_string())))
            }
            Strategy::AllowedList(params) => {
                let Some(v) = value else {
                    return unset(params);
                };
                if !params.allowed.matches(v) {
                    return Err(StrategyError::NotAllowed {
                        value: v.to_string(),
                        allowed: params.allowed.describe(),
                    });
                }
                Ok(params.finish(v))
            }
            Strategy::MultiAllowedList(params) => {
                let Some(v) = value else {
                    return unset(params);
                };
                if let Some(token) = v
                    .split(',')
                    .map(str::trim)
                    .find(|token| !params.allowed.matches(token))
                {
                    return Err(StrategyError::TokenNotAllowed {
                        token: token.to_string(),
                        allowed: params.allowed.describe(),
                    });
                }
                Ok(params.finish(v))
            }
        }
    }
}

fn unset(params: &AllowedParams) -> Result<Outcome, StrategyError> {
    if params.allow_empty {
        Ok(params.finish(""))
    } else {
        Err(StrategyError::Unset)
    }
}
