// src/core/style.rs
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::bundle::FileRecord;

/// Share of lines that must carry a `;` for a file to count as semicolon-style
const SEMICOLON_LINE_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indentation {
    Spaces,
    Tabs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsyncStyle {
    AsyncAwait,
    Promises,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamingConvention {
    CamelCase,
    SnakeCase,
}

/// Inferred textual conventions of a code base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub indentation: Indentation,
    pub indent_size: usize,
    pub quotes: QuoteStyle,
    pub semicolons: bool,
    pub async_style: AsyncStyle,
    pub naming: NamingConvention,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            indentation: Indentation::Spaces,
            indent_size: 2,
            quotes: QuoteStyle::Double,
            semicolons: true,
            async_style: AsyncStyle::AsyncAwait,
            naming: NamingConvention::CamelCase,
        }
    }
}

/// Raw totals gathered across all sampled files
#[derive(Debug, Default)]
struct StyleCounts {
    space_runs: usize,
    tab_runs: usize,
    two_space_runs: usize,
    four_space_runs: usize,
    single_quotes: usize,
    double_quotes: usize,
    semicolon_files: usize,
    plain_files: usize,
    async_tokens: usize,
    promise_tokens: usize,
    camel_transitions: usize,
    snake_transitions: usize,
}

/// Majority-vote style inference over sampled file content.
///
/// Every signal is a character or token count; nothing here parses code.
pub struct StyleDetector {
    space_indent_regex: Regex,
    tab_indent_regex: Regex,
    async_regex: Regex,
    promise_regex: Regex,
    camel_regex: Regex,
    snake_regex: Regex,
}

impl StyleDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            space_indent_regex: Regex::new(r"\n( {2,})")?,
            tab_indent_regex: Regex::new(r"\n\t+")?,
            async_regex: Regex::new(r"\b(?:async|await)\b")?,
            promise_regex: Regex::new(r"\.then\(|\.catch\(|\bnew Promise\b")?,
            camel_regex: Regex::new(r"[a-z][A-Z]")?,
            snake_regex: Regex::new(r"[a-z]_[a-z]")?,
        })
    }

    pub fn detect<'a, I>(&self, files: I) -> StyleProfile
    where
        I: IntoIterator<Item = &'a FileRecord>,
    {
        let mut counts = StyleCounts::default();
        let mut sampled = 0usize;

        for file in files {
            if file.content.is_empty() {
                continue;
            }
            sampled += 1;
            self.accumulate(&file.content, &mut counts);
        }

        if sampled == 0 {
            return StyleProfile::default();
        }

        StyleProfile {
            indentation: if counts.tab_runs > counts.space_runs {
                Indentation::Tabs
            } else {
                Indentation::Spaces
            },
            indent_size: if counts.four_space_runs > counts.two_space_runs { 4 } else { 2 },
            quotes: if counts.single_quotes > counts.double_quotes {
                QuoteStyle::Single
            } else {
                QuoteStyle::Double
            },
            semicolons: counts.semicolon_files >= counts.plain_files,
            async_style: if counts.promise_tokens > counts.async_tokens {
                AsyncStyle::Promises
            } else {
                AsyncStyle::AsyncAwait
            },
            naming: if counts.snake_transitions > counts.camel_transitions {
                NamingConvention::SnakeCase
            } else {
                NamingConvention::CamelCase
            },
        }
    }

    fn accumulate(&self, content: &str, counts: &mut StyleCounts) {
        for caps in self.space_indent_regex.captures_iter(content) {
            counts.space_runs += 1;
            match caps.get(1).map(|m| m.len()) {
                Some(2) => counts.two_space_runs += 1,
                Some(4) => counts.four_space_runs += 1,
                _ => {}
            }
        }
        counts.tab_runs += self.tab_indent_regex.find_iter(content).count();

        counts.single_quotes += content.matches('\'').count();
        counts.double_quotes += content.matches('"').count();

        let semicolons = content.matches(';').count() as f64;
        let lines = content.lines().count() as f64;
        if semicolons > lines * SEMICOLON_LINE_RATIO {
            counts.semicolon_files += 1;
        } else {
            counts.plain_files += 1;
        }

        counts.async_tokens += self.async_regex.find_iter(content).count();
        counts.promise_tokens += self.promise_regex.find_iter(content).count();

        counts.camel_transitions += self.camel_regex.find_iter(content).count();
        counts.snake_transitions += self.snake_regex.find_iter(content).count();
    }
}
