//! Rule matching.
//!
//! Rules are compiled once into a [`Matcher`] and evaluated in declaration
//! order. Within a rule every non-empty pattern must match (AND); across rules
//! the first full match wins.
use crate::config::Rule;
use crate::source::Entry;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Entry field a rule pattern is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Feed,
    Author,
    Title,
    Content,
}

impl RuleField {
    /// Compilation and evaluation order within a rule.
    const ALL: [RuleField; 4] = [
        RuleField::Feed,
        RuleField::Author,
        RuleField::Title,
        RuleField::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Feed => "feed",
            RuleField::Author => "author",
            RuleField::Title => "title",
            RuleField::Content => "content",
        }
    }

    fn pattern<'r>(&self, rule: &'r Rule) -> &'r str {
        match self {
            RuleField::Feed => &rule.feed,
            RuleField::Author => &rule.author,
            RuleField::Title => &rule.title,
            RuleField::Content => &rule.content,
        }
    }

    /// The value this field's pattern runs against. Entries without a parent
    /// feed have an empty feed title.
    fn value<'e>(&self, entry: &'e Entry) -> &'e str {
        match self {
            RuleField::Feed => entry.feed_title(),
            RuleField::Author => &entry.author,
            RuleField::Title => &entry.title,
            RuleField::Content => &entry.content,
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule pattern failed to compile.
#[derive(Debug, Error)]
#[error("invalid regex in rule '{rule}' field '{field}': {source}")]
pub struct RuleError {
    pub rule: String,
    pub field: RuleField,
    #[source]
    pub source: regex::Error,
}

/// Outcome of a successful match: the winning rule and its lower-cased action.
///
/// The action is not validated here; anything other than `read` or `remove`
/// is left for the caller to reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub rule: &'a Rule,
    pub action: String,
}

#[derive(Debug)]
struct CompiledRule {
    rule: Rule,
    /// Only the fields with a non-empty pattern; absent fields never constrain.
    patterns: Vec<(RuleField, Regex)>,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> Result<Self, RuleError> {
        let mut patterns = Vec::with_capacity(RuleField::ALL.len());

        for field in RuleField::ALL {
            let pattern = field.pattern(rule);
            if pattern.is_empty() {
                continue;
            }
            let regex = Regex::new(pattern).map_err(|source| RuleError {
                rule: rule.name.clone(),
                field,
                source,
            })?;
            patterns.push((field, regex));
        }

        Ok(Self {
            rule: rule.clone(),
            patterns,
        })
    }

    fn matches(&self, entry: &Entry) -> bool {
        self.patterns
            .iter()
            .all(|(field, regex)| regex.is_match(field.value(entry)))
    }
}

/// Compiled, immutable rule set.
///
/// Construction is the only fallible step; matching never fails and never
/// mutates, so a `Matcher` can be shared freely (e.g. behind an `Arc`).
#[derive(Debug)]
pub struct Matcher {
    rules: Vec<CompiledRule>,
}

impl Matcher {
    /// Compile `rules` in order, stopping at the first invalid pattern.
    ///
    /// An empty rule list yields a matcher that never matches.
    pub fn new(rules: &[Rule]) -> Result<Self, RuleError> {
        let rules = rules
            .iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Return the first rule whose every pattern matches `entry`, if any.
    pub fn match_entry(&self, entry: &Entry) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .find(|compiled| compiled.matches(entry))
            .map(|compiled| RuleMatch {
                rule: &compiled.rule,
                action: compiled.rule.action.to_lowercase(),
            })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
