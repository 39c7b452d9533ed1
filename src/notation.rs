//! Dice notation grammar
//!
//! Text like `"2d8+4 + d20 + 4d6@6,6"` becomes a [`Notation`]: an ordered list
//! of [`RollTerm`]s, one per ` + `-separated segment. Parsing happens in two
//! phases (split, then validate each segment) so that a bad segment only
//! poisons its own term.
//!
//! Segment grammar:
//!
//! ```text
//! segment  := junk? count? type modifier? forced? junk?
//! count    := digit+
//! type     := letter+ digit+            (must name a known die, e.g. "d20")
//! modifier := ws* ('+' | '-') ws* digit+
//! forced   := '@' digit+ (',' digit+)*
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dice::DieType;
use crate::error::NotationError;

/// Largest count a single term may expand to
pub const MAX_TERM_DICE: usize = 1000;

/// One `+`-separated segment of a notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollTerm {
    /// Segment text as entered (trimmed)
    pub original: String,
    /// Expanded dice, one entry per die, in declaration order
    pub dice: Vec<DieType>,
    /// Modifier added to the term's dice
    #[serde(rename = "mod")]
    pub modifier: i32,
    /// Internal face values for a prefix of `dice`; missing entries roll naturally
    pub forced_results: Vec<i32>,
    /// Set when the segment was rejected; such terms carry no dice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NotationError>,
}

impl RollTerm {
    fn rejected(original: &str, error: NotationError) -> Self {
        Self {
            original: original.to_string(),
            dice: Vec::new(),
            modifier: 0,
            forced_results: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether the segment parsed into usable dice
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Forced results as externally visible values, e.g. `70` for a d100 at 7
    pub fn external_forced_results(&self) -> Vec<i32> {
        self.dice
            .iter()
            .zip(&self.forced_results)
            .map(|(die, &face)| die.to_external_value(face))
            .collect()
    }

    /// The term as parseable text, forced results included, e.g. `"2d100+1@70,30"`
    pub fn replay_text(&self) -> String {
        let Some(&die) = self.dice.first().filter(|_| self.is_valid()) else {
            return self.original.clone();
        };
        let mut text = match self.dice.len() {
            1 => Self::signature(die, self.modifier),
            n => format!("{}{}", n, Self::signature(die, self.modifier)),
        };
        let forced: Vec<String> = self
            .external_forced_results()
            .iter()
            .map(i32::to_string)
            .collect();
        if !forced.is_empty() {
            text.push('@');
            text.push_str(&forced.join(","));
        }
        text
    }

    /// Signature used when folding terms back into text, e.g. `"d6+2"`
    fn signature(die: DieType, modifier: i32) -> String {
        match modifier {
            0 => die.to_string(),
            m if m > 0 => format!("{}+{}", die, m),
            m => format!("{}{}", die, m),
        }
    }
}

/// A full roll request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notation {
    pub terms: Vec<RollTerm>,
}

impl Notation {
    /// Parse free text into a notation. Never fails; rejected segments carry
    /// an error on their term.
    pub fn parse(text: &str) -> Self {
        let terms: Vec<RollTerm> = split_segments(text)
            .into_iter()
            .map(parse_segment)
            .collect();

        for term in terms.iter().filter(|t| !t.is_valid()) {
            if let Some(err) = term.error {
                log::warn!("Notation segment {:?} rejected: {}", term.original, err);
            }
        }

        Self { terms }
    }

    /// Fold the notation back into text.
    ///
    /// Dice are tallied per `die+modifier` signature in first-seen order, so
    /// original whitespace and forced results are not preserved.
    pub fn stringify(&self) -> String {
        let mut tally: Vec<(String, u32)> = Vec::new();
        let mut bump = |sig: String| match tally.iter_mut().find(|(s, _)| *s == sig) {
            Some((_, count)) => *count += 1,
            None => tally.push((sig, 1)),
        };

        for term in &self.terms {
            if term.is_valid() {
                for &die in &term.dice {
                    bump(RollTerm::signature(die, term.modifier));
                }
            } else {
                bump(term.original.clone());
            }
        }

        tally
            .into_iter()
            .map(|(sig, count)| {
                if count == 1 {
                    sig
                } else {
                    format!("{}{}", count, sig)
                }
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// All dice of the valid terms, flattened in declaration order
    pub fn dice(&self) -> Vec<DieType> {
        self.terms
            .iter()
            .filter(|t| t.is_valid())
            .flat_map(|t| t.dice.iter().copied())
            .collect()
    }

    /// Total number of dice that would be thrown
    pub fn die_count(&self) -> usize {
        self.terms
            .iter()
            .filter(|t| t.is_valid())
            .map(|t| t.dice.len())
            .sum()
    }

    /// Whether a throw of this notation would be a no-op
    pub fn is_empty(&self) -> bool {
        self.die_count() == 0
    }

    /// Per-die forced face values aligned with [`Notation::dice`].
    ///
    /// Slots without a forced value, and forced values outside the die's face
    /// range, are `None`.
    pub fn forced_results(&self) -> Vec<Option<i32>> {
        let mut slots = Vec::with_capacity(self.die_count());
        for term in self.terms.iter().filter(|t| t.is_valid()) {
            for (i, &die) in term.dice.iter().enumerate() {
                let slot = term.forced_results.get(i).copied().filter(|&v| {
                    let ok = die.face_range().contains(v);
                    if !ok {
                        log::warn!("Dropping forced result {} for {}: out of range", v, die);
                    }
                    ok
                });
                slots.push(slot);
            }
        }
        slots
    }

    /// Whether any die carries a forced result
    pub fn has_forced_results(&self) -> bool {
        self.forced_results().iter().any(Option::is_some)
    }

    /// Back-fill forced results from a finished roll so the notation can be
    /// replayed elsewhere. `values` are externally visible values aligned with
    /// [`Notation::dice`]; they are stored as face values, so render them
    /// back with [`Notation::replay_text`].
    pub fn back_fill(&mut self, values: &[i32]) {
        let mut values = values.iter();
        for term in self.terms.iter_mut().filter(|t| t.is_valid()) {
            term.forced_results = term
                .dice
                .iter()
                .zip(values.by_ref())
                .map(|(die, &v)| die.to_face_value(v))
                .collect();
        }
    }

    /// Text that parses back into this notation with its forced results.
    ///
    /// Unlike [`Notation::stringify`] terms are not folded, and forced
    /// results are written as externally visible values.
    pub fn replay_text(&self) -> String {
        self.terms
            .iter()
            .map(RollTerm::replay_text)
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// Sum of the externally visible die values plus each valid term's modifier
    pub fn total(&self, values: &[i32]) -> i32 {
        let modifiers: i32 = self
            .terms
            .iter()
            .filter(|t| t.is_valid() && !t.dice.is_empty())
            .map(|t| t.modifier)
            .sum();
        values.iter().sum::<i32>() + modifiers
    }

    /// Terms that failed to parse
    pub fn errors(&self) -> impl Iterator<Item = &RollTerm> {
        self.terms.iter().filter(|t| !t.is_valid())
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

/// Split on `+` with required whitespace on both sides (`\s+\+\s+`)
fn split_segments(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let mut plus = i;
        while plus < bytes.len() && bytes[plus].is_ascii_whitespace() {
            plus += 1;
        }
        let mut end = plus + 1;
        while end < bytes.len() && bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        if plus < bytes.len() && bytes[plus] == b'+' && end > plus + 1 {
            segments.push(&text[start..i]);
            start = end;
            i = end;
        } else {
            i = plus;
        }
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Scanned positions of the core pattern inside a segment
struct Core {
    count_start: usize,
    type_start: usize,
    digits_end: usize,
}

/// Locate the first `digit* letter+ digit+` run
fn find_core(bytes: &[u8]) -> Option<Core> {
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }
        let type_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            continue;
        }
        let mut count_start = type_start;
        while count_start > 0 && bytes[count_start - 1].is_ascii_digit() {
            count_start -= 1;
        }
        return Some(Core {
            count_start,
            type_start,
            digits_end: i,
        });
    }
    None
}

/// Consume `ws* [+-] ws* digit+`, returning the modifier and the new position
fn scan_modifier(bytes: &[u8], mut pos: usize) -> Option<(i64, usize)> {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let sign = match bytes.get(pos) {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return None,
    };
    pos += 1;
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let (value, end) = scan_number(bytes, pos)?;
    Some((sign * value, end))
}

/// Consume `digit+`
fn scan_number(bytes: &[u8], pos: usize) -> Option<(i64, usize)> {
    let end = bytes[pos..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |n| pos + n);
    if end == pos {
        return None;
    }
    let digits = std::str::from_utf8(&bytes[pos..end]).ok()?;
    digits.parse::<i64>().ok().map(|v| (v, end))
}

/// Consume `'@' digit+ (',' digit+)*`
fn scan_forced(bytes: &[u8], pos: usize) -> Option<(Vec<i64>, usize)> {
    if bytes.get(pos) != Some(&b'@') {
        return None;
    }
    let (first, mut end) = scan_number(bytes, pos + 1)?;
    let mut values = vec![first];
    while bytes.get(end) == Some(&b',') {
        match scan_number(bytes, end + 1) {
            Some((v, next)) => {
                values.push(v);
                end = next;
            }
            None => break,
        }
    }
    Some((values, end))
}

fn parse_segment(segment: &str) -> RollTerm {
    let bytes = segment.as_bytes();
    let Some(core) = find_core(bytes) else {
        return RollTerm::rejected(segment, NotationError::Unrecognized);
    };

    let mut pos = core.digits_end;
    let mut modifier = 0i64;
    if let Some((value, end)) = scan_modifier(bytes, pos) {
        modifier = value;
        pos = end;
    }
    let mut forced = Vec::new();
    if let Some((values, end)) = scan_forced(bytes, pos) {
        forced = values;
        pos = end;
    }

    if core.count_start > 0 || pos < bytes.len() {
        return RollTerm::rejected(segment, NotationError::SuperfluousCharacters);
    }

    let type_token = segment[core.type_start..core.digits_end].to_ascii_lowercase();
    let Ok(die) = type_token.parse::<DieType>() else {
        return RollTerm::rejected(segment, NotationError::InvalidDiceType);
    };

    let count_digits = &segment[core.count_start..core.type_start];
    let count = if count_digits.is_empty() {
        Ok(1)
    } else {
        count_digits.parse::<usize>()
    };
    let (Ok(count), Ok(modifier)) = (count, i32::try_from(modifier)) else {
        return RollTerm::rejected(segment, NotationError::Unrecognized);
    };
    if count > MAX_TERM_DICE {
        return RollTerm::rejected(segment, NotationError::Unrecognized);
    }
    let forced_results = forced
        .into_iter()
        .map(|v| i32::try_from(v).map(|v| die.to_face_value(v)))
        .collect::<Result<Vec<_>, _>>();
    let Ok(forced_results) = forced_results else {
        return RollTerm::rejected(segment, NotationError::Unrecognized);
    };

    RollTerm {
        original: segment.to_string(),
        dice: vec![die; count],
        modifier,
        forced_results,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> RollTerm {
        let notation = Notation::parse(text);
        assert_eq!(notation.terms.len(), 1, "expected one term for {text:?}");
        notation.terms.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_plain_count() {
        let term = single("4d6");
        assert_eq!(term.dice, vec![DieType::D6; 4]);
        assert_eq!(term.modifier, 0);
        assert!(term.forced_results.is_empty());
        assert!(term.error.is_none());
    }

    #[test]
    fn test_parse_modifier() {
        let term = single("2d8+4");
        assert_eq!(term.dice, vec![DieType::D8, DieType::D8]);
        assert_eq!(term.modifier, 4);

        let term = single("d20 - 3");
        assert_eq!(term.dice, vec![DieType::D20]);
        assert_eq!(term.modifier, -3);
    }

    #[test]
    fn test_parse_forced_prefix() {
        let notation = Notation::parse("4d6@6,6");
        let term = &notation.terms[0];
        assert_eq!(term.dice, vec![DieType::D6; 4]);
        assert_eq!(term.forced_results, vec![6, 6]);
        assert_eq!(
            notation.forced_results(),
            vec![Some(6), Some(6), None, None]
        );
    }

    #[test]
    fn test_parse_invalid_type() {
        let notation = Notation::parse("2e8-3");
        assert_eq!(notation.terms[0].error, Some(NotationError::InvalidDiceType));
        assert_eq!(notation.die_count(), 0);
        assert!(notation.is_empty());

        let term = single("3d7");
        assert_eq!(term.error, Some(NotationError::InvalidDiceType));
    }

    #[test]
    fn test_parse_d100_forced_scaled() {
        let term = single("d100@70");
        assert_eq!(term.forced_results, vec![7]);
    }

    #[test]
    fn test_parse_unrecognized_and_superfluous() {
        assert_eq!(single("hello").error, Some(NotationError::Unrecognized));
        assert_eq!(single("12").error, Some(NotationError::Unrecognized));
        assert_eq!(
            single("x2d6").error,
            Some(NotationError::SuperfluousCharacters)
        );
        assert_eq!(
            single("2d6!!").error,
            Some(NotationError::SuperfluousCharacters)
        );
        assert_eq!(
            single("2d6+").error,
            Some(NotationError::SuperfluousCharacters)
        );
    }

    #[test]
    fn test_errors_do_not_abort_other_terms() {
        let notation = Notation::parse("2d6 + bogus + d20+1");
        assert_eq!(notation.terms.len(), 3);
        assert_eq!(notation.errors().count(), 1);
        assert_eq!(
            notation.dice(),
            vec![DieType::D6, DieType::D6, DieType::D20]
        );
    }

    #[test]
    fn test_split_requires_whitespace_around_plus() {
        let notation = Notation::parse("2d8+4 + d20");
        assert_eq!(notation.terms.len(), 2);
        assert_eq!(notation.terms[0].modifier, 4);
        assert_eq!(notation.terms[1].dice, vec![DieType::D20]);

        let notation = Notation::parse("d6\t+\n d8");
        assert_eq!(notation.terms.len(), 2);
    }

    #[test]
    fn test_empty_input_is_empty_notation() {
        assert!(Notation::parse("").terms.is_empty());
        assert!(Notation::parse("   ").is_empty());
    }

    #[test]
    fn test_case_insensitive_type() {
        assert_eq!(single("2D6").dice, vec![DieType::D6; 2]);
    }

    #[test]
    fn test_stringify_folds_counts() {
        let notation = Notation::parse("d6+2 + 2d6+2 + d20 + d6");
        assert_eq!(notation.stringify(), "3d6+2 + d20 + d6");
    }

    #[test]
    fn test_stringify_keeps_error_text() {
        let notation = Notation::parse("2d8-1 + 2e8-3");
        assert_eq!(notation.stringify(), "2d8-1 + 2e8-3");
    }

    #[test]
    fn test_selector_append() {
        let notation = Notation::parse(&format!("{} + {}", "2d6", "d6"));
        assert_eq!(notation.to_string(), "3d6");
    }

    #[test]
    fn test_total_and_back_fill() {
        let mut notation = Notation::parse("2d6+3 + d100");
        assert_eq!(notation.total(&[4, 5, 70]), 82);

        notation.back_fill(&[4, 5, 70]);
        assert_eq!(notation.terms[0].forced_results, vec![4, 5]);
        assert_eq!(notation.terms[1].forced_results, vec![7]);
        assert_eq!(
            notation.forced_results(),
            vec![Some(4), Some(5), Some(7)]
        );
    }

    #[test]
    fn test_back_filled_d100_replays_in_tens() {
        let mut notation = Notation::parse("d100 + 2d10-1 + d6");
        notation.back_fill(&[70, 0, 9, 4]);
        assert_eq!(notation.terms[0].external_forced_results(), vec![70]);

        let text = notation.replay_text();
        assert_eq!(text, "d100@70 + 2d10-1@0,9 + d6@4");
        let replay = Notation::parse(&text);
        assert_eq!(
            replay.forced_results(),
            vec![Some(7), Some(0), Some(9), Some(4)]
        );
        assert_eq!(replay.total(&[70, 0, 9, 4]), notation.total(&[70, 0, 9, 4]));
    }

    #[test]
    fn test_replay_text_keeps_rejected_terms() {
        let notation = Notation::parse("2d6 + 3d7");
        assert_eq!(notation.replay_text(), "2d6 + 3d7");
    }

    #[test]
    fn test_out_of_range_forced_dropped() {
        let notation = Notation::parse("2d6@9,3");
        assert_eq!(notation.forced_results(), vec![None, Some(3)]);
    }
}
