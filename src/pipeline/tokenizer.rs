//! Message tokenizer.
//!
//! Splits chat text into plain-text runs, `[sample]` references, `{n}`
//! effect markers and the `{.}` reset marker.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Bracket spans, brace spans, then runs free of brackets, braces and whitespace.
static LEXEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\{[^}]*\}|[^\[\]{}\s]+").expect("valid lexeme regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Plain words, merged with single spaces.
    Text(String),
    /// Sample library reference, brackets included (`[airhorn]`).
    SampleRef(String),
    /// Effect id to apply to the following segment.
    EffectMarker(u32),
    /// `{.}`: close the segment and forget pending effects.
    ResetMarker,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::SampleRef(name) => write!(f, "{name}"),
            Self::EffectMarker(id) => write!(f, "{{{id}}}"),
            Self::ResetMarker => write!(f, "{{.}}"),
        }
    }
}

/// Tokenize a raw message. Empty or blank input yields no tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    // Whether the last pushed token is a plain run that may absorb the next word.
    let mut open_run = false;

    for lexeme in LEXEME.find_iter(text).map(|m| m.as_str()) {
        if lexeme.starts_with('[') {
            tokens.push(Token::SampleRef(lexeme.to_string()));
            open_run = false;
        } else if lexeme.starts_with('{') {
            tokens.push(classify_brace(lexeme));
            open_run = false;
        } else if open_run {
            if let Some(Token::Text(run)) = tokens.last_mut() {
                run.push(' ');
                run.push_str(lexeme);
            }
        } else {
            tokens.push(Token::Text(lexeme.to_string()));
            open_run = true;
        }
    }

    tokens
}

fn classify_brace(span: &str) -> Token {
    let inner = &span[1..span.len() - 1];
    if inner == "." {
        return Token::ResetMarker;
    }
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        // Ids past u32 saturate: still a segment boundary, never a table entry.
        return Token::EffectMarker(inner.parse().unwrap_or(u32::MAX));
    }
    // Unrecognized brace spans are spoken verbatim but stay standalone.
    Token::Text(span.to_string())
}
