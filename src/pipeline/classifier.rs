//! Message classifier: decides whether a message is a greeting, a menu pick,
//! or noise.
//!
//! Rules, first match wins:
//! - sender is not a one-to-one chat → Ignore
//! - body contains a greeting keyword (case and accents ignored) → Greeting
//! - trimmed body equals a menu token → OptionSelect
//! - anything else → Ignore

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::ConfigError;
use crate::pipeline::menu::MenuConfig;
use crate::pipeline::types::{Classification, InboundMessage, SenderScope};

/// Lowercase `text` and drop combining marks, so "Olá" and "OLA" both become "ola".
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Pure, table-driven classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Alternation of folded keywords; `None` when no keywords are configured.
    greeting: Option<Regex>,
    tokens: HashSet<String>,
}

impl Classifier {
    /// Build a classifier from explicit keyword and token sets.
    pub fn new<K, T>(keywords: K, tokens: T) -> Result<Self, ConfigError>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        let alternatives: Vec<String> = keywords
            .into_iter()
            .map(|k| fold(k.as_ref().trim()))
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(&k))
            .collect();

        let greeting = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!("(?i)(?:{})", alternatives.join("|"));
            Some(Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
                key: "greeting_keywords".to_string(),
                message: e.to_string(),
            })?)
        };

        Ok(Self {
            greeting,
            tokens: tokens.into_iter().map(Into::into).collect(),
        })
    }

    /// Build a classifier from the menu table.
    pub fn from_menu(menu: &MenuConfig) -> Result<Self, ConfigError> {
        Self::new(&menu.greeting_keywords, menu.tokens().map(str::to_string))
    }

    /// Classify the raw text of a message from a sender with the given scope.
    pub fn classify_text(&self, scope: SenderScope, body: &str) -> Classification {
        if !scope.is_individual() {
            return Classification::Ignore;
        }

        if self.is_greeting(body) {
            return Classification::Greeting;
        }

        let trimmed = body.trim();
        if self.tokens.contains(trimmed) {
            return Classification::OptionSelect {
                option: trimmed.to_string(),
            };
        }

        Classification::Ignore
    }

    /// Classify an inbound message.
    pub fn classify(&self, message: &InboundMessage) -> Classification {
        let classification = self.classify_text(message.scope, &message.body);
        debug!(
            id = %message.id,
            sender = %message.sender,
            scope = ?message.scope,
            result = classification.label(),
            "Classified message"
        );
        classification
    }

    /// Whether the body contains any greeting keyword.
    pub fn is_greeting(&self, body: &str) -> bool {
        self.greeting
            .as_ref()
            .is_some_and(|re| re.is_match(&fold(body)))
    }
}
