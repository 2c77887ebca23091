//! UTF-16 helpers. JS string indices are code unit indices, while realm
//! strings are stored as UTF-8.

/// Encode as UTF-16 code units
pub fn to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Decode UTF-16 code units; lone surrogates become U+FFFD
pub fn from_utf16(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Length in UTF-16 code units
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Substring by UTF-16 indices (clamped)
pub fn substring(units: &[u16], start: usize, end: usize) -> String {
    let end = end.min(units.len());
    let start = start.min(end);
    from_utf16(&units[start..end])
}

/// Index of `needle` in `haystack` at or after `from`
pub fn index_of(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..].starts_with(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_len() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("\u{1F600}"), 2);
    }

    #[test]
    fn test_index_of() {
        let hay = to_utf16("abcabc");
        assert_eq!(index_of(&hay, &to_utf16("c"), 0), Some(2));
        assert_eq!(index_of(&hay, &to_utf16("c"), 3), Some(5));
        assert_eq!(index_of(&hay, &to_utf16("x"), 0), None);
        assert_eq!(index_of(&hay, &[], 6), Some(6));
    }

    #[test]
    fn test_substring_clamps() {
        let units = to_utf16("hello");
        assert_eq!(substring(&units, 1, 3), "el");
        assert_eq!(substring(&units, 4, 99), "o");
        assert_eq!(substring(&units, 9, 2), "");
    }
}
