//! RegExp internal slots backed by `regress`.
//!
//! Matching works on UTF-16 code units so that indices agree with JS string
//! indices: `u`/`v` patterns use `find_from_utf16`, others `find_from_ucs2`.

use regress::{Flags, Regex};

use crate::error::{VmError, VmResult};

/// Parsed `[[OriginalFlags]]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegExpFlags {
    pub has_indices: bool,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub unicode: bool,
    pub unicode_sets: bool,
    pub sticky: bool,
}

impl RegExpFlags {
    /// Parse a flags string; duplicates, unknown flags and `u` with `v` are
    /// SyntaxErrors.
    pub fn parse(flags: &str) -> VmResult<Self> {
        let mut out = Self::default();
        for ch in flags.chars() {
            let slot = match ch {
                'd' => &mut out.has_indices,
                'g' => &mut out.global,
                'i' => &mut out.ignore_case,
                'm' => &mut out.multiline,
                's' => &mut out.dot_all,
                'u' => &mut out.unicode,
                'v' => &mut out.unicode_sets,
                'y' => &mut out.sticky,
                _ => {
                    return Err(VmError::syntax_error(format!(
                        "Invalid regular expression flags '{flags}'"
                    )));
                }
            };
            if *slot {
                return Err(VmError::syntax_error(format!(
                    "Invalid regular expression flags '{flags}'"
                )));
            }
            *slot = true;
        }
        if out.unicode && out.unicode_sets {
            return Err(VmError::syntax_error(format!(
                "Invalid regular expression flags '{flags}'"
            )));
        }
        Ok(out)
    }

    /// Full unicode matching (`u` or `v`)
    pub fn full_unicode(&self) -> bool {
        self.unicode || self.unicode_sets
    }

    /// Canonical flag string in `dgimsuvy` order
    pub fn to_flag_string(&self) -> String {
        let mut s = String::new();
        for (on, ch) in [
            (self.has_indices, 'd'),
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.unicode_sets, 'v'),
            (self.sticky, 'y'),
        ] {
            if on {
                s.push(ch);
            }
        }
        s
    }

    fn engine_flags(&self) -> Flags {
        let mut s = String::new();
        for (on, ch) in [
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.unicode_sets, 'v'),
        ] {
            if on {
                s.push(ch);
            }
        }
        Flags::from(s.as_str())
    }
}

/// A match in UTF-16 code unit indices
#[derive(Debug, Clone)]
pub struct RegExpMatch {
    pub start: usize,
    pub end: usize,
    /// Capture groups (index 0 is group 1)
    pub captures: Vec<Option<(usize, usize)>>,
}

/// `[[RegExpMatcher]]`, `[[OriginalSource]]` and `[[OriginalFlags]]`
pub struct JsRegExp {
    source: String,
    flags: RegExpFlags,
    capture_group_names: Vec<Option<String>>,
    regex: Regex,
}

impl std::fmt::Debug for JsRegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags.to_flag_string())
    }
}

impl JsRegExp {
    /// Compile `pattern` with `flags`
    pub fn new(pattern: &str, flags: &str) -> VmResult<Self> {
        let parsed = RegExpFlags::parse(flags)?;
        let regex = Regex::with_flags(pattern, parsed.engine_flags()).map_err(|e| {
            VmError::syntax_error(format!("Invalid regular expression: /{pattern}/: {e}"))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            flags: parsed,
            capture_group_names: parse_capture_group_names(pattern),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> RegExpFlags {
        self.flags
    }

    /// Capture group names by capture index (group 1 at index 0)
    pub fn capture_group_names(&self) -> &[Option<String>] {
        &self.capture_group_names
    }

    pub fn has_named_groups(&self) -> bool {
        self.capture_group_names.iter().any(Option::is_some)
    }

    /// Find the first match at or after `start`
    pub fn find_from(&self, input: &[u16], start: usize) -> Option<RegExpMatch> {
        if start > input.len() {
            return None;
        }
        let m = if self.flags.full_unicode() {
            self.regex.find_from_utf16(input, start).next()
        } else {
            self.regex.find_from_ucs2(input, start).next()
        }?;
        Some(RegExpMatch {
            start: m.range.start,
            end: m.range.end,
            captures: m
                .captures
                .iter()
                .map(|c| c.as_ref().map(|r| (r.start, r.end)))
                .collect(),
        })
    }

    /// EscapeRegExpPattern
    pub fn escaped_source(&self) -> String {
        escape_pattern(&self.source)
    }
}

/// EscapeRegExpPattern: the source as it would appear in a literal
pub fn escape_pattern(source: &str) -> String {
    if source.is_empty() {
        return "(?:)".to_string();
    }
    let mut out = String::with_capacity(source.len());
    let mut escaped = false;
    let mut in_class = false;
    for ch in source.chars() {
        match ch {
            '/' if !escaped && !in_class => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
        if !escaped {
            match ch {
                '[' => in_class = true,
                ']' => in_class = false,
                _ => {}
            }
        }
        escaped = ch == '\\' && !escaped;
    }
    out
}

/// Capture group names in capture order; `None` for unnamed groups
pub(crate) fn parse_capture_group_names(pattern: &str) -> Vec<Option<String>> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut in_class = false;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\\' {
            i += 2;
            continue;
        }
        if in_class {
            if ch == ']' {
                in_class = false;
            }
            i += 1;
            continue;
        }
        if ch == '[' {
            in_class = true;
            i += 1;
            continue;
        }
        if ch != '(' {
            i += 1;
            continue;
        }

        if chars.get(i + 1) == Some(&'?') {
            // (?<name>...) captures; (?<=, (?<!, (?:, (?=, (?! do not
            if chars.get(i + 2) == Some(&'<')
                && !matches!(chars.get(i + 3), Some('=') | Some('!'))
            {
                let name: String = chars[i + 3..].iter().take_while(|c| **c != '>').collect();
                out.push((!name.is_empty()).then_some(name));
            }
        } else {
            out.push(None);
        }
        i += 1;
    }

    out
}

/// AdvanceStringIndex
pub fn advance_string_index(units: &[u16], index: usize, full_unicode: bool) -> usize {
    if !full_unicode || index + 1 >= units.len() {
        return index + 1;
    }
    let lead = units[index];
    let trail = units[index + 1];
    if (0xD800..=0xDBFF).contains(&lead) && (0xDC00..=0xDFFF).contains(&trail) {
        index + 2
    } else {
        index + 1
    }
}
