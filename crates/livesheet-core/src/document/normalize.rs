//! Natural-language normalization.
//!
//! Free-form lines use multi-word names (`number of cats`) and unit
//! phrases (`kg m`). Before a line reaches the engine, runs of plain words
//! are merged: if every word is a known unit they stay a space-separated
//! unit phrase, otherwise they collapse into one identifier
//! (`numberofcats`). A single unknown word anywhere forces the collapse.

use livesheet_engine::engine::ExpressionEngine;

/// Words that never merge into identifiers.
pub const RESERVED_WORDS: &[&str] = &["in", "to", "mod", "and", "or", "xor", "not", "true", "false"];

const SPACED_CHARS: &[char] = &['(', ')', '[', ']', '{', '}', '*', '/', ',', '^'];

fn is_word(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

/// Whether a word token may be merged with its neighbours.
pub fn is_mergeable<E: ExpressionEngine + ?Sized>(token: &str, engine: &E) -> bool {
    is_word(token) && !RESERVED_WORDS.contains(&token) && !engine.is_builtin(token)
}

/// Join a run of words the way [`normalize`] does.
pub fn merge_words<E: ExpressionEngine + ?Sized>(words: &[&str], engine: &E) -> String {
    if words.iter().all(|w| engine.is_known_unit(w)) {
        words.join(" ")
    } else {
        words.concat()
    }
}

/// Rewrite `text` into the token grammar the engine expects.
pub fn normalize<E: ExpressionEngine + ?Sized>(text: &str, engine: &E) -> String {
    let mut spaced = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if SPACED_CHARS.contains(&c) {
            spaced.push(' ');
            spaced.push(c);
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    for token in spaced.split_whitespace() {
        if is_mergeable(token, engine) {
            buffer.push(token);
            continue;
        }
        if !buffer.is_empty() {
            out.push(merge_words(&buffer, engine));
            buffer.clear();
        }
        out.push(token.to_string());
    }
    if !buffer.is_empty() {
        out.push(merge_words(&buffer, engine));
    }
    out.join(" ")
}
