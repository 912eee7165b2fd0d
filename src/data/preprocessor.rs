// ============================================================
// Layer 4 — Caption Preprocessor
// ============================================================
// Cleans a raw caption before it reaches the tokenizer.
//
// Bangla annotation files come from spreadsheets and web forms,
// so captions often carry:
//   - Non-breaking and zero-width spaces
//   - Tabs and stray control characters
//   - The danda (।) and ASCII punctuation glued to words
//   - Runs of spaces and line breaks inside one caption
//
// Cleaning steps (applied in order):
//   1. Replace whitespace variants and control chars with a space
//   2. Replace punctuation (ASCII set plus । and ॥) with a space
//   3. Collapse all whitespace into single spaces, trim the ends
//
// Zero-width joiner / non-joiner (U+200D / U+200C) are kept:
// they change how Bangla conjuncts render.
//
// After cleaning, `wrap` adds the sequence markers the decoder
// is trained on: "<start> ... <end>".
//
// Reference: Rust Book §8 (Strings in Rust)

pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN:   &str = "<end>";

const PUNCTUATION: &str = "!\"#$%&()*+.,-/:;=?@[\\]^_`{|}~।॥";

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw caption into a single line of space-separated words.
    pub fn clean(&self, text: &str) -> String {
        let mapped: String = text
            .chars()
            .map(|c| match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c if PUNCTUATION.contains(c) => ' ',
                c => c,
            })
            .collect();

        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Clean a caption and surround it with <start> / <end>.
    pub fn wrap(&self, caption: &str) -> String {
        format!("{START_TOKEN} {} {END_TOKEN}", self.clean(caption))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  একটি   ছেলে\tমাঠে\n খেলছে "), "একটি ছেলে মাঠে খেলছে");
    }

    #[test]
    fn test_strips_danda_and_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("একটি ছেলে খেলছে।"), "একটি ছেলে খেলছে");
        assert_eq!(p.clean("নদী, পাহাড়!"), "নদী পাহাড়");
    }

    #[test]
    fn test_keeps_zero_width_joiner() {
        let p = Preprocessor::new();
        let word = "র\u{200D}্যাব";
        assert_eq!(p.clean(word), word);
    }

    #[test]
    fn test_removes_invisible_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("এক\u{200B}দুই\u{00A0}তিন"), "এক দুই তিন");
    }

    #[test]
    fn test_wrap_adds_markers() {
        let p = Preprocessor::new();
        assert_eq!(p.wrap(" একটি গাছ। "), "<start> একটি গাছ <end>");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }
}
