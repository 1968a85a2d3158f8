//! Reply cleanup before synthesis.
//!
//! The chat model is told not to use written-only symbols, but it still
//! slips in markdown and bracketed asides now and then. The voice would read
//! them out or stumble over them. Anything that might carry meaning (a lone
//! `~` in `3~5`, a `_`, an aside that never closes) is left alone, so the
//! audio says what the `X-Response` header shows.

/// Emphasis and code markers, removed only when they come in pairs.
/// Longer runs first so `**` is not taken for two `*`.
const PAIRED: &[&str] = &["**", "__", "~~", "`", "*"];

/// Block markers, removed only at the start of a line.
const LINE_START: &[char] = &['#', '>'];

const BRACKETS: &[(char, char)] = &[('(', ')'), ('（', '）'), ('[', ']'), ('【', '】')];

/// Strip markdown markers and bracketed asides and collapse whitespace.
/// Falls back to the original text if nothing speakable is left.
pub fn clean_for_speech(text: &str) -> String {
    let text = strip_paired(strip_line_markers(text));
    let cleaned = drop_asides(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        text.trim().to_string()
    } else {
        cleaned
    }
}

fn strip_line_markers(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start().trim_start_matches(LINE_START).trim_start())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_paired(mut text: String) -> String {
    for marker in PAIRED {
        let count = text.matches(marker).count();
        if count >= 2 && count % 2 == 0 {
            text = text.replace(marker, "");
        }
    }
    text
}

fn drop_asides(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    let mut held = String::new();
    let mut closing: Vec<char> = Vec::new();

    for ch in text.chars() {
        if let Some(&(_, close)) = BRACKETS.iter().find(|(open, _)| *open == ch) {
            closing.push(close);
            held.push(ch);
            continue;
        }
        if closing.is_empty() {
            kept.push(ch);
            continue;
        }
        held.push(ch);
        if closing.last() == Some(&ch) {
            closing.pop();
            if closing.is_empty() {
                held.clear();
            }
        }
    }

    // Never closed: it was not an aside, it is the rest of the reply.
    kept.push_str(&held);
    kept
}
