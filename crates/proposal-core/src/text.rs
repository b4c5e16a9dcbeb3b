//! Character/byte offset conversion.
//!
//! All public offsets in this crate are **character offsets** (Unicode scalar values). Regex
//! matching and slicing happen on bytes, so every snapshot goes through a [`CharIndex`].

#[derive(Debug)]
pub(crate) struct CharIndex {
    char_to_byte: Vec<usize>,
    text_len: usize,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            text_len: text.len(),
        }
    }

    pub(crate) fn char_count(&self) -> usize {
        self.char_to_byte.len().saturating_sub(1)
    }

    pub(crate) fn char_to_byte(&self, char_offset: usize) -> usize {
        let clamped = char_offset.min(self.char_count());
        self.char_to_byte
            .get(clamped)
            .cloned()
            .unwrap_or(self.text_len)
    }

    pub(crate) fn byte_to_char(&self, byte_offset: usize) -> usize {
        let clamped = byte_offset.min(self.text_len);
        match self.char_to_byte.binary_search(&clamped) {
            Ok(idx) => idx,
            Err(idx) => idx,
        }
    }

    /// Slice `text` by a half-open character range (clamped to the text).
    pub(crate) fn slice<'a>(&self, text: &'a str, from: usize, to: usize) -> &'a str {
        let start = self.char_to_byte(from);
        let end = self.char_to_byte(to.max(from));
        text.get(start..end).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_multibyte_offsets() {
        let text = "a👋b\nc";
        let index = CharIndex::new(text);
        assert_eq!(index.char_count(), 5);
        assert_eq!(index.char_to_byte(2), 5);
        assert_eq!(index.byte_to_char(5), 2);
        assert_eq!(index.slice(text, 1, 3), "👋b");
        assert_eq!(index.slice(text, 3, 99), "\nc");
    }
}
