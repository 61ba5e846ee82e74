//! Text cleaning for scraped table cells.

/// Normalise a scraped cell: newlines/tabs become spaces, runs of
/// whitespace collapse to one space, leading/trailing whitespace is
/// trimmed. Idempotent. Content is otherwise untouched (no case
/// folding, no punctuation stripping).
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_ws = false;

    for ch in raw.chars() {
        if ch.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(ch);
        }
    }

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
