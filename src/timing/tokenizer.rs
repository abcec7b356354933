//! Script tokenizer
//!
//! Splits a narration script into words and bracketed markers. Markers are
//! recognised even when glued to neighbouring words (`in.[pause]Now`).

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Spoken word (may carry attached punctuation)
    Word,
    /// Pause marker such as `[pause]` or `[long pause]`
    Pause {
        /// Marker asked for an extended pause
        long: bool,
    },
    /// Any other bracketed marker such as `[whispers]`
    Tag,
}

/// Token borrowed from the script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Word closes its sentence. Always false for markers.
    pub ends_sentence: bool,
}

const SENTENCE_TERMINATORS: [char; 4] = ['.', '!', '?', '…'];
const CLOSING_WRAPPERS: [char; 8] = ['"', '\'', '”', '’', ')', ']', '»', '*'];

pub(crate) fn tokenize(script: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut pos = 0;

    while let Some(ch) = script[pos..].chars().next() {
        if ch.is_whitespace() {
            flush_word(script, &mut word_start, pos, &mut tokens);
            pos += ch.len_utf8();
            continue;
        }

        if ch == '[' {
            if let Some(close) = script[pos..].find(']') {
                let end = pos + close + 1;
                let marker = &script[pos..end];
                // A newline inside the brackets means this is not a marker.
                if !marker.contains('\n') {
                    flush_word(script, &mut word_start, pos, &mut tokens);
                    if let Some(kind) = classify_marker(marker) {
                        tokens.push(Token {
                            kind,
                            text: marker,
                            ends_sentence: false,
                        });
                    }
                    pos = end;
                    continue;
                }
            }
        }

        if word_start.is_none() {
            word_start = Some(pos);
        }
        pos += ch.len_utf8();
    }
    flush_word(script, &mut word_start, script.len(), &mut tokens);

    tokens
}

fn flush_word<'a>(
    script: &'a str,
    word_start: &mut Option<usize>,
    end: usize,
    tokens: &mut Vec<Token<'a>>,
) {
    if let Some(start) = word_start.take() {
        let text = &script[start..end];
        tokens.push(Token {
            kind: TokenKind::Word,
            text,
            ends_sentence: ends_sentence(text),
        });
    }
}

fn classify_marker(marker: &str) -> Option<TokenKind> {
    let inner = marker[1..marker.len() - 1].trim().to_lowercase();
    if inner.is_empty() {
        return None;
    }
    if inner.contains("pause") {
        Some(TokenKind::Pause {
            long: inner.contains("long"),
        })
    } else {
        Some(TokenKind::Tag)
    }
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(&CLOSING_WRAPPERS[..])
        .chars()
        .next_back()
        .is_some_and(|c| SENTENCE_TERMINATORS.contains(&c))
}
