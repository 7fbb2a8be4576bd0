//! Half-open lexicographic ranges over lower-cased names.
//!
//! `start = None` is the pre-alphabet bucket (digits, symbols, underscore).
//! `end = None` runs to the end of the keyspace.

use std::fmt;

/// A range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlphaRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Boundaries of the five-way split (plus the pre-alphabet bucket).
const FIVE_WAY_BOUNDS: [&str; 5] = ["a", "f", "k", "p", "u"];

/// Second-letter boundaries inside one leading letter.
const TWO_LETTER_BOUNDS: [char; 4] = ['f', 'k', 'p', 'u'];

impl AlphaRange {
    pub fn new(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: start.map(str::to_lowercase),
            end: end.map(str::to_lowercase),
        }
    }

    /// The pre-alphabet bucket `<a`.
    pub fn pre_alpha() -> Self {
        Self::new(None, Some("a"))
    }

    pub fn is_pre_alpha(&self) -> bool {
        self.start.is_none() && self.end.is_some()
    }

    /// Display label: `<a`, `a-f`, `u+`.
    pub fn label(&self) -> String {
        match (&self.start, &self.end) {
            (None, Some(end)) => format!("<{end}"),
            (Some(start), Some(end)) => format!("{start}-{end}"),
            (Some(start), None) => format!("{start}+"),
            (None, None) => "all".to_string(),
        }
    }

    /// Whether `value` (compared lower-cased) falls in this range.
    pub fn contains(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        let above = self.start.as_deref().is_none_or(|s| value.as_str() >= s);
        let below = self.end.as_deref().is_none_or(|e| value.as_str() < e);
        above && below
    }

    /// The six top-level ranges: `<a, a-f, f-k, k-p, p-u, u+`.
    pub fn five_way() -> Vec<AlphaRange> {
        let mut ranges = vec![Self::pre_alpha()];
        for pair in FIVE_WAY_BOUNDS.windows(2) {
            ranges.push(Self::new(Some(pair[0]), Some(pair[1])));
        }
        ranges.push(Self::new(FIVE_WAY_BOUNDS.last().copied(), None));
        ranges
    }

    /// Single-letter ranges `a-b .. y-z, z+` whose start lies inside `self`.
    ///
    /// Empty for the pre-alphabet bucket, which cannot be split by letter.
    pub fn single_letters(&self) -> Vec<AlphaRange> {
        let Some(start) = self.start.as_deref() else {
            return Vec::new();
        };
        ('a'..='z')
            .filter(|c| {
                let s = c.to_string();
                s.as_str() >= start && self.end.as_deref().is_none_or(|e| s.as_str() < e)
            })
            .map(Self::letter)
            .collect()
    }

    /// The range covering every name that starts with `letter`.
    pub fn letter(letter: char) -> AlphaRange {
        let start = letter.to_string();
        if letter >= 'z' {
            Self::new(Some(&start), None)
        } else {
            let next = ((letter as u8) + 1) as char;
            Self::new(Some(&start), Some(&next.to_string()))
        }
    }

    /// Five two-letter sub-ranges tiling the names that start with `letter`:
    /// `x-xf, xf-xk, xk-xp, xp-xu, xu-ya` (`zu+` for the last letter).
    ///
    /// The first range starts at the bare letter so that `x` itself and
    /// `x` followed by a non-letter stay covered.
    pub fn two_letter(letter: char) -> Vec<AlphaRange> {
        let letter = letter.to_ascii_lowercase();
        let mut starts = vec![letter.to_string()];
        starts.extend(TWO_LETTER_BOUNDS.iter().map(|b| format!("{letter}{b}")));

        let tail = if letter >= 'z' {
            None
        } else {
            Some(format!("{}a", ((letter as u8) + 1) as char))
        };

        let mut ranges = Vec::with_capacity(starts.len());
        for (i, start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).cloned().or_else(|| tail.clone());
            ranges.push(Self::new(Some(start), end.as_deref()));
        }
        ranges
    }

    /// Leading letter of the range start, if any.
    pub fn leading_letter(&self) -> Option<char> {
        self.start.as_deref().and_then(|s| s.chars().next())
    }
}

impl fmt::Display for AlphaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
