//! Programming-language classification for code segments.
//!
//! The [`LanguageGuesser`] trait is the boundary to whatever classifier is
//! available; the built-in [`MarkerLanguageGuesser`] scores a code block
//! against per-language syntax markers and answers only when confident.
//! When it declines, the segmenter falls back to the most frequently
//! mentioned known language in the whole document.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Classifier boundary for code blocks.
pub trait LanguageGuesser {
    /// Classify `code`, returning a known language name, or `None` when the
    /// classifier is not confident enough to commit.
    fn guess(&self, code: &str) -> Option<String>;
}

/// A known language: canonical name, prose aliases, and syntax markers.
pub struct LanguageProfile {
    pub name: &'static str,
    /// Alternative names that count as mentions in prose.
    pub aliases: &'static [&'static str],
    /// Substrings characteristic of the language's source text.
    markers: &'static [&'static str],
}

/// Built-in language table.
///
/// Order matters only for tie-breaking: earlier entries win equal scores.
pub const LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "python",
        aliases: &["python3", "cpython"],
        markers: &["def ", "import ", "self.", "elif ", "lambda ", "print(", "None"],
    },
    LanguageProfile {
        name: "java",
        aliases: &[],
        markers: &[
            "public class",
            "public static void",
            "System.out",
            "extends ",
            "implements ",
            "@Override",
        ],
    },
    LanguageProfile {
        name: "javascript",
        aliases: &["js", "node", "nodejs"],
        markers: &["function ", "const ", "=> ", "console.log", "var ", "===", "async "],
    },
    LanguageProfile {
        name: "rust",
        aliases: &[],
        markers: &["fn ", "let mut ", "impl ", "pub fn", "match ", "-> ", "&self"],
    },
    LanguageProfile {
        name: "c",
        aliases: &[],
        markers: &["#include", "printf(", "int main(", "void ", "sizeof(", "->"],
    },
    LanguageProfile {
        name: "cpp",
        aliases: &["c++"],
        markers: &["std::", "#include", "template<", "cout", "nullptr", "::"],
    },
    LanguageProfile {
        name: "go",
        aliases: &["golang"],
        markers: &["func ", "package ", ":= ", "fmt.", "go func", "defer "],
    },
    LanguageProfile {
        name: "ruby",
        aliases: &[],
        markers: &["def ", "end\n", "puts ", "require ", "do |", "@"],
    },
    LanguageProfile {
        name: "csharp",
        aliases: &["c#"],
        markers: &["using System", "namespace ", "public class", "Console.Write", "void "],
    },
    LanguageProfile {
        name: "php",
        aliases: &[],
        markers: &["<?php", "$", "echo ", "function ", "->"],
    },
    LanguageProfile {
        name: "sql",
        aliases: &[],
        markers: &["SELECT ", "FROM ", "WHERE ", "INSERT INTO", "CREATE TABLE"],
    },
    LanguageProfile {
        name: "shell",
        aliases: &["bash", "sh"],
        markers: &["#!/bin", "echo ", "fi\n", "esac", "$(", "&&"],
    },
];

/// Marker-counting classifier over the built-in [`LANGUAGES`] table.
#[derive(Debug, Clone)]
pub struct MarkerLanguageGuesser {
    /// Minimum distinct markers that must match before committing.
    min_score: usize,
}

impl MarkerLanguageGuesser {
    pub fn new(min_score: usize) -> Self {
        Self { min_score }
    }
}

impl Default for MarkerLanguageGuesser {
    fn default() -> Self {
        Self::new(2)
    }
}

impl LanguageGuesser for MarkerLanguageGuesser {
    fn guess(&self, code: &str) -> Option<String> {
        let mut best: Option<(&'static str, usize)> = None;

        for profile in LANGUAGES {
            let score = profile
                .markers
                .iter()
                .filter(|marker| code.contains(*marker))
                .count();

            match best {
                Some((_, top)) if score <= top => {}
                _ if score > 0 => best = Some((profile.name, score)),
                _ => {}
            }
        }

        match best {
            Some((name, score)) if score >= self.min_score => Some(name.to_string()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document-level fallback
// ---------------------------------------------------------------------------

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// The most frequently mentioned known language in `raw_text`, if any.
///
/// Counts standalone word occurrences of each language name and alias,
/// case-insensitively. Computed once per document and used as the fallback
/// for code blocks the classifier declines.
pub fn document_fallback_language(raw_text: &str) -> Option<String> {
    let lowered = raw_text.to_lowercase();

    let mut token_counts: HashMap<&str, usize> = HashMap::new();
    for token in WORD_RE.find_iter(&lowered) {
        *token_counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut counts: Vec<(usize, &'static str)> = Vec::new();
    for profile in LANGUAGES {
        let mut total = *token_counts.get(profile.name).unwrap_or(&0);
        for alias in profile.aliases {
            // Aliases with non-word characters ("c++", "c#") never tokenize;
            // they are counted through their word-shaped forms only.
            total += *token_counts.get(*alias).unwrap_or(&0);
        }
        if total > 0 {
            counts.push((total, profile.name));
        }
    }

    counts.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
    counts.first().map(|(_, name)| name.to_string())
}
