//! Input normalization and tokenization.
//!
//! Utterances are NFKC-normalized, lowercased, and split on anything that is
//! not a word character, apostrophe, or hyphen. Sentence punctuation (`.`,
//! `;`) advances a clause counter; the negation window never crosses a
//! clause.

use unicode_normalization::UnicodeNormalization;

/// A single word token with its clause position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Index of the clause this token belongs to.
    pub clause: usize,
}

/// Normalize and tokenize an utterance.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut current = String::new();
    let mut clause = 0usize;

    for ch in text.nfkc() {
        let ch = if ch == '\u{2019}' { '\'' } else { ch };
        if ch.is_alphanumeric() {
            for lc in ch.to_lowercase() {
                current.push(lc);
            }
        } else if ch == '\'' || ch == '-' {
            current.push(ch);
        } else if ch == '.' || ch == ';' {
            flush(&mut current, &mut tokens, clause);
            clause += 1;
        } else {
            flush(&mut current, &mut tokens, clause);
        }
    }
    flush(&mut current, &mut tokens, clause);
    tokens
}

/// Normalize a keyword phrase into its token texts.
pub fn normalize_phrase(phrase: &str) -> Vec<String> {
    tokenize(phrase).into_iter().map(|t| t.text).collect()
}

fn flush(current: &mut String, tokens: &mut Vec<Token>, clause: usize) {
    let trimmed = current.trim_matches(|c| c == '\'' || c == '-');
    if !trimmed.is_empty() {
        tokens.push(Token {
            text: trimmed.to_string(),
            clause,
        });
    }
    current.clear();
}
