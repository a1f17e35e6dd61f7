//! SCPI keyword forms and abbreviation matching.
//!
//! Every keyword has a long form and a short form. The short form is derived
//! from the long form by the usual SCPI rule:
//!
//! - a keyword of four letters or fewer is its own short form
//! - otherwise the first four letters are kept, or only three when the
//!   fourth letter is a vowel
//! - trailing digits (`CH1`) are not letters and are carried over unchanged
//!
//! A keyword defined as a phrase (`Frequency Count`) first collapses into the
//! initials of all words but the last followed by the whole last word
//! (`FCOUNT`), then the rule above is applied (`FCO`).
//!
//! A typed token matches a keyword when, ignoring case, it equals either the
//! short form or the long form. Vendor spellings such as `HORIzontal` are the
//! long form in mixed case; `HO` and `HORIZ` are rejected.

use std::fmt;

/// One node of a command path, with its precomputed matching forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keyword {
    long: String,
    short: String,
}

impl Keyword {
    /// Create a keyword from a single word (case is normalized).
    pub fn new(word: &str) -> Self {
        let long = word.to_ascii_uppercase();
        let short = short_form(&long);
        Keyword { long, short }
    }

    /// Create a keyword from a multi-word phrase.
    pub fn phrase(words: &[&str]) -> Self {
        Keyword::new(&phrase_long_form(words))
    }

    /// The upper-case long form.
    pub fn long(&self) -> &str {
        &self.long
    }

    /// The upper-case canonical short form.
    pub fn short(&self) -> &str {
        &self.short
    }

    /// The long form with the short-form part upper-case and the rest lower
    /// case, as vendor manuals print it (`SCReen`).
    pub fn display_form(&self) -> String {
        let (head, tail) = self.long.split_at(self.short_letter_len());
        let digits_len = trailing_digits(&self.long);
        let tail_letters = &tail[..tail.len() - digits_len.min(tail.len())];
        let digits = &self.long[self.long.len() - digits_len..];
        if tail_letters.is_empty() {
            return self.long.clone();
        }
        format!("{}{}{}", head, tail_letters.to_ascii_lowercase(), digits)
    }

    /// Check whether a typed token names this keyword.
    pub fn matches(&self, token: &str) -> bool {
        token.eq_ignore_ascii_case(&self.long) || token.eq_ignore_ascii_case(&self.short)
    }

    fn short_letter_len(&self) -> usize {
        self.short.len() - trailing_digits(&self.short)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.long)
    }
}

/// Derive the canonical short form of a single keyword.
pub fn short_form(keyword: &str) -> String {
    let upper = keyword.to_ascii_uppercase();
    let digits = trailing_digits(&upper);
    let (letters, suffix) = upper.split_at(upper.len() - digits);

    let stem = if letters.chars().count() <= 4 {
        letters
    } else if is_vowel(letters.as_bytes()[3]) {
        &letters[..3]
    } else {
        &letters[..4]
    };
    format!("{}{}", stem, suffix)
}

/// Collapse a phrase into its long form: initials of every word except the
/// last, followed by the whole last word.
pub fn phrase_long_form(words: &[&str]) -> String {
    match words.split_last() {
        Some((last, init)) => {
            let mut long: String = init
                .iter()
                .filter_map(|w| w.chars().next())
                .map(|c| c.to_ascii_uppercase())
                .collect();
            long.push_str(&last.to_ascii_uppercase());
            long
        }
        None => String::new(),
    }
}

fn is_vowel(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'A' | b'E' | b'I' | b'O' | b'U')
}

fn trailing_digits(s: &str) -> usize {
    s.bytes().rev().take_while(u8::is_ascii_digit).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_rules() {
        assert_eq!(short_form("DATA"), "DATA");
        assert_eq!(short_form("HEAD"), "HEAD");
        assert_eq!(short_form("SCALE"), "SCAL");
        assert_eq!(short_form("SCREEN"), "SCR");
        assert_eq!(short_form("COUPLING"), "COUP");
        assert_eq!(short_form("PROBE"), "PROB");
        assert_eq!(short_form("OFFSET"), "OFFS");
        assert_eq!(short_form("HORIZONTAL"), "HOR");
        assert_eq!(short_form("display"), "DISP");
        assert_eq!(short_form("CH1"), "CH1");
        assert_eq!(short_form("CHANNEL2"), "CHAN2");
    }

    #[test]
    fn test_phrase_long_form() {
        assert_eq!(phrase_long_form(&["Frequency", "Count"]), "FCOUNT");
        let kw = Keyword::phrase(&["frequency", "count"]);
        assert_eq!(kw.long(), "FCOUNT");
        assert_eq!(kw.short(), "FCO");
        assert!(kw.matches("fco"));
        assert!(kw.matches("FCount"));
    }

    #[test]
    fn test_matches_full_and_short_any_case() {
        let kw = Keyword::new("SCREEN");
        assert!(kw.matches("SCREEN"));
        assert!(kw.matches("screen"));
        assert!(kw.matches("SCR"));
        assert!(kw.matches("scr"));
        assert!(kw.matches("SCReen"));
    }

    #[test]
    fn test_rejects_short_prefix_and_overlong() {
        let kw = Keyword::new("HORIZONTAL");
        assert!(!kw.matches("HO"));
        assert!(!kw.matches("H"));
        assert!(!kw.matches(""));
        assert!(!kw.matches("HORIZONTALX"));
        assert!(!kw.matches("HOX"));
        assert!(kw.matches("hor"));
        assert!(kw.matches("HORIzontal"));
    }

    #[test]
    fn test_rejects_prefix_between_short_and_long() {
        let kw = Keyword::new("HORIZONTAL");
        assert!(!kw.matches("HORI"));
        assert!(!kw.matches("HORIZ"));
        assert!(!kw.matches("horizonta"));
        assert!(!Keyword::new("SCREEN").matches("SCRE"));
    }

    #[test]
    fn test_numeric_suffix_is_required() {
        let kw = Keyword::new("CHANNEL1");
        assert!(kw.matches("CHAN1"));
        assert!(kw.matches("channel1"));
        assert!(!kw.matches("Chann1"));
        assert!(!kw.matches("CHAN2"));
        assert!(!kw.matches("CHAN"));
        assert!(!kw.matches("CHA1"));

        let ch = Keyword::new("CH2");
        assert!(ch.matches("ch2"));
        assert!(!ch.matches("ch1"));
        assert!(!ch.matches("ch"));
    }

    #[test]
    fn test_display_form() {
        assert_eq!(Keyword::new("SCREEN").display_form(), "SCReen");
        assert_eq!(Keyword::new("HEAD").display_form(), "HEAD");
        assert_eq!(Keyword::new("CHANNEL1").display_form(), "CHANnel1");
    }
}
