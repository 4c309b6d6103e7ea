// src/normalize.rs
//! Text normalizer and PII redaction boundary.
//!
//! Everything downstream (classifiers, logs) only ever sees `NormalizedText`,
//! which can only be produced here. Raw journal text never crosses this module.
//!
//! Steps, in order:
//! 1) reject empty / over-long input
//! 2) HTML entity decode + tag strip (web and OCR input)
//! 3) redact emails, street addresses, phone numbers, names
//!    (after honorifics or introducers, known names, and capitalized words
//!    inside a sentence that are not ordinary vocabulary)
//! 4) ASCII quotes, lower-case, collapse whitespace

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::classify::fallback::embedded_lexicon;
use crate::config::NormalizerConfig;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    Email,
    Phone,
    Address,
    Name,
}

impl PiiKind {
    /// Lower-case so that case folding after redaction leaves it intact.
    pub fn placeholder(self) -> &'static str {
        match self {
            PiiKind::Email => "[email]",
            PiiKind::Phone => "[phone]",
            PiiKind::Address => "[address]",
            PiiKind::Name => "[name]",
        }
    }
}

/// Cleaned, redacted, lower-cased journal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedText {
    text: String,
    redactions: usize,
}

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of PII spans replaced by placeholders.
    pub fn redactions(&self) -> usize {
        self.redactions
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("email regex")
});

static RE_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\+\d{7,15}\b|\b\d{10,15}\b|(?:\+\d{1,3}[\s.-]?)?(?:\(\d{2,4}\)[\s.-]?|\b\d{2,4}[\s.-])?\b\d{3,4}[\s.-]?\d{4}\b",
    )
    .expect("phone regex")
});

static RE_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d{1,5}\s+(?:[a-z0-9.'-]+\s+){0,3}(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way|place|pl|terrace|parkway|pkwy)\b\.?",
    )
    .expect("address regex")
});

static RE_HONORIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Miss|Dr|Prof)\.?\s+\p{Lu}[\p{L}'-]+(?:\s+\p{Lu}[\p{L}'-]+)?")
        .expect("honorific regex")
});

// Capitalized word right after a phrase that usually introduces a person.
static RE_INTRODUCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?P<intro>(?i:named|called|my name is|name's|with|met|told|texted|saw|visited))\s+(?P<name>\p{Lu}\p{Ll}[\p{L}'-]*)",
    )
    .expect("introducer regex")
});

// Any capitalized word; whether it is a name is decided by position and vocabulary.
static RE_CAPITALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\p{Lu}\p{Ll}[\p{L}'-]*").expect("capitalized word regex"));

/// Capitalized words never treated as names (the mood lexicon is added on top).
const NOT_NAMES: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december", "god", "mom", "dad", "mum",
    "everyone", "today", "tonight", "tomorrow", "yesterday", "christmas", "easter",
    "internet", "english", "fear", "grief", "joy", "love", "rage", "hope", "anger",
    "anxiety", "stress", "sadness", "panic",
];

#[derive(Debug, Clone)]
pub struct Normalizer {
    max_len: usize,
    known_names: Option<Regex>,
    /// Lower-cased words that are vocabulary, not names.
    vocabulary: Arc<HashSet<String>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        let vocabulary = NOT_NAMES
            .iter()
            .map(|w| w.to_string())
            .chain(embedded_lexicon().keys().cloned())
            .collect();
        Self {
            max_len: cfg.max_text_length,
            known_names: build_names_regex(&cfg.known_names),
            vocabulary: Arc::new(vocabulary),
        }
    }

    /// Extra words that must never be redacted as names.
    pub fn with_vocabulary<I>(mut self, words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Arc::make_mut(&mut self.vocabulary)
            .extend(words.into_iter().map(|w| w.as_ref().trim().to_lowercase()));
        self
    }

    fn is_vocabulary(&self, word: &str) -> bool {
        let lower = word.to_lowercase();
        let base = lower.strip_suffix("'s").unwrap_or(lower.as_str());
        self.vocabulary.contains(&lower) || self.vocabulary.contains(base)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Clean and redact `raw`. Pure; fails only on empty or over-long input.
    pub fn normalize(&self, raw: &str) -> Result<NormalizedText, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let len = raw.chars().count();
        if len > self.max_len {
            return Err(ValidationError::TooLong {
                len,
                max: self.max_len,
            });
        }

        let decoded = html_escape::decode_html_entities(raw);
        let stripped = RE_TAGS.replace_all(&decoded, " ");

        let mut redactions = 0usize;
        let text = self.redact(&stripped, &mut redactions);

        let text = text
            .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
            .replace(['\u{2018}', '\u{2019}'], "'")
            .to_lowercase();
        let text = RE_WS.replace_all(&text, " ").trim().to_string();

        if text.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(NormalizedText { text, redactions })
    }

    fn redact(&self, input: &str, count: &mut usize) -> String {
        let mut out = replace_counted(&RE_EMAIL, input, PiiKind::Email, count);
        out = replace_counted(&RE_ADDRESS, &out, PiiKind::Address, count);
        out = replace_counted(&RE_PHONE, &out, PiiKind::Phone, count);
        out = replace_counted(&RE_HONORIFIC, &out, PiiKind::Name, count);

        out = RE_INTRODUCED
            .replace_all(&out, |caps: &Captures<'_>| {
                let intro = &caps["intro"];
                let name = &caps["name"];
                if self.is_vocabulary(name) {
                    format!("{intro} {name}")
                } else {
                    *count += 1;
                    format!("{intro} {}", PiiKind::Name.placeholder())
                }
            })
            .into_owned();

        if let Some(re) = &self.known_names {
            out = replace_counted(re, &out, PiiKind::Name, count);
        }
        self.redact_capitalized(&out, count)
    }

    /// A capitalized word inside a sentence is a name unless it is vocabulary.
    /// Sentence-initial words are left to the other detectors.
    fn redact_capitalized(&self, input: &str, count: &mut usize) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for m in RE_CAPITALIZED.find_iter(input) {
            if starts_sentence(&input[..m.start()]) || self.is_vocabulary(m.as_str()) {
                continue;
            }
            out.push_str(&input[last..m.start()]);
            out.push_str(PiiKind::Name.placeholder());
            last = m.end();
            *count += 1;
        }
        out.push_str(&input[last..]);
        out
    }
}

/// True when nothing but a sentence boundary precedes this point.
fn starts_sentence(before: &str) -> bool {
    let trimmed = before.trim_end();
    if before[trimmed.len()..].contains('\n') {
        return true;
    }
    let trimmed = trimmed.trim_end_matches(['"', '\'', '(', '\u{201C}', '\u{2018}']);
    matches!(trimmed.chars().last(), None | Some('.' | '!' | '?'))
}

/// Convenience wrapper using the default configuration.
pub fn normalize(raw: &str) -> Result<NormalizedText, ValidationError> {
    Normalizer::default().normalize(raw)
}

fn replace_counted(re: &Regex, input: &str, kind: PiiKind, count: &mut usize) -> String {
    re.replace_all(input, |_: &Captures<'_>| {
        *count += 1;
        kind.placeholder()
    })
    .into_owned()
}

fn build_names_regex(names: &[String]) -> Option<Regex> {
    let alts: Vec<String> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(regex::escape)
        .collect();
    if alts.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b(?:{})\b", alts.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "known-names list did not compile; skipping it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_is_rejected() {
        assert_eq!(normalize(""), Err(ValidationError::Empty));
        assert_eq!(normalize("  \n\t "), Err(ValidationError::Empty));
        // Only markup => nothing left.
        assert_eq!(normalize("<br/><p></p>"), Err(ValidationError::Empty));
    }

    #[test]
    fn over_long_input_is_rejected() {
        let cfg = NormalizerConfig {
            max_text_length: 10,
            known_names: vec![],
        };
        let n = Normalizer::new(&cfg);
        assert_eq!(
            n.normalize("abcdefghijk"),
            Err(ValidationError::TooLong { len: 11, max: 10 })
        );
        assert!(n.normalize("abcdefghij").is_ok());
    }

    #[test]
    fn canonicalizes_case_whitespace_and_markup() {
        let out = normalize("  Today   was <b>GREAT</b> &amp;\n\u{201C}calm\u{201D} ").unwrap();
        assert_eq!(out.as_str(), "today was great & \"calm\"");
        assert_eq!(out.redactions(), 0);
    }

    #[test]
    fn redacts_emails_and_phones() {
        let out =
            normalize("Mail me at jane.doe@example.com or call +1 (555) 123-4567 tonight").unwrap();
        assert_eq!(out.as_str(), "mail me at [email] or call [phone] tonight");
        assert_eq!(out.redactions(), 2);

        let local = normalize("her number is 555-1234").unwrap();
        assert_eq!(local.as_str(), "her number is [phone]");

        let bare = normalize("call me at 5551234567 tonight").unwrap();
        assert_eq!(bare.as_str(), "call me at [phone] tonight");

        let e164 = normalize("my cell is +15551234567").unwrap();
        assert_eq!(e164.as_str(), "my cell is [phone]");
    }

    #[test]
    fn dates_are_not_phone_numbers() {
        let out = normalize("On 2024-10-19 I felt calm").unwrap();
        assert!(out.as_str().contains("2024-10-19"));
        assert_eq!(out.redactions(), 0);
    }

    #[test]
    fn redacts_street_addresses() {
        let out = normalize("Moved into 42 Wallaby Way last week").unwrap();
        assert_eq!(out.as_str(), "moved into [address] last week");
        assert_eq!(out.redactions(), 1);
    }

    #[test]
    fn redacts_names_by_context() {
        let out = normalize("Had lunch with Sarah and talked to Dr. Emily Stone.").unwrap();
        assert_eq!(out.as_str(), "had lunch with [name] and talked to [name].");

        let intro = normalize("My name is Carol and I feel fine").unwrap();
        assert_eq!(intro.as_str(), "my name is [name] and i feel fine");
    }

    #[test]
    fn capitalized_words_inside_a_sentence_are_names() {
        let out = normalize("Today Sarah and Tom came over").unwrap();
        assert_eq!(out.as_str(), "today [name] and [name] came over");
        assert_eq!(out.redactions(), 2);

        let two = normalize("Long day. Priya called.\nOmar never did").unwrap();
        assert_eq!(two.as_str(), "long day. priya called. omar never did");
        assert_eq!(two.redactions(), 0);
    }

    #[test]
    fn mood_words_survive_name_redaction() {
        let out = normalize("Dealing with Anxiety again").unwrap();
        assert_eq!(out.as_str(), "dealing with anxiety again");

        let out = normalize("Another day of Stress and Fear").unwrap();
        assert_eq!(out.as_str(), "another day of stress and fear");
        assert_eq!(out.redactions(), 0);
    }

    #[test]
    fn extra_vocabulary_is_kept() {
        let n = Normalizer::default().with_vocabulary(["Zen", " Bliss "]);
        let out = n.normalize("Pure Zen and Bliss with Noor").unwrap();
        assert_eq!(out.as_str(), "pure zen and bliss with [name]");
        assert_eq!(out.redactions(), 1);

        // The default normalizer does not know these.
        let plain = normalize("Pure Zen and Bliss").unwrap();
        assert_eq!(plain.as_str(), "pure [name] and [name]");
    }

    #[test]
    fn weekdays_and_months_are_kept() {
        let out = normalize("I saw Monday coming and met March with dread").unwrap();
        assert_eq!(out.as_str(), "i saw monday coming and met march with dread");
    }

    #[test]
    fn known_names_are_redacted_case_insensitively() {
        let cfg = NormalizerConfig {
            known_names: vec!["Priya".into(), "  ".into()],
            ..Default::default()
        };
        let n = Normalizer::new(&cfg);
        let out = n.normalize("priya made me laugh").unwrap();
        assert_eq!(out.as_str(), "[name] made me laugh");
    }

    #[test]
    fn normalize_is_pure() {
        let a = normalize("Feeling  Anxious about work").unwrap();
        let b = normalize("Feeling  Anxious about work").unwrap();
        assert_eq!(a, b);
    }
}
