//! Text cleanup before synthesis.
//!
//! PDF extraction leaves artifacts a TTS engine reads out loud or stumbles
//! over: line-break hyphenation, runs of whitespace, stray page numbers.
//! One cleanup pass runs over the aggregated buffer before it is handed to
//! the engine.

use regex::Regex;

pub struct TextProcessor {
    cleanup_regex: Vec<(Regex, &'static str)>,
    hyphen_regex: Regex,
    paragraph_regex: Regex,
    space_regex: Regex,
}

impl TextProcessor {
    pub fn new() -> Self {
        let cleanup_patterns = vec![
            // Page-number lines left over from headers/footers
            (Regex::new(r"(?m)^\s*\d{1,4}\s*$").unwrap(), ""),
            (Regex::new(r"\b[Pp]age\s+\d+\b").unwrap(), ""),
            // Smart quotes trip up some espeak voices
            (Regex::new(r"[\u{2018}\u{2019}`]").unwrap(), "'"),
            (Regex::new(r"[\u{201C}\u{201D}]").unwrap(), "\""),
            // Normalize dashes and ellipses
            (Regex::new(r"[\u{2013}\u{2014}]").unwrap(), "-"),
            (Regex::new(r"\.{3,}").unwrap(), "..."),
            // Fix spacing around punctuation
            (Regex::new(r"\s+([,.!?;:])").unwrap(), "$1"),
        ];

        Self {
            cleanup_regex: cleanup_patterns,
            hyphen_regex: Regex::new(r"(\w+)-\s*\n\s*(\w+)").unwrap(),
            paragraph_regex: Regex::new(r"\n\s*\n").unwrap(),
            space_regex: Regex::new(r"[ \t]+").unwrap(),
        }
    }

    pub fn clean_text(&self, text: &str) -> String {
        // Rejoin words split across line breaks before anything else eats
        // the newlines.
        let mut cleaned = self
            .hyphen_regex
            .replace_all(text, "$1$2")
            .to_string();

        for (regex, replacement) in &self.cleanup_regex {
            cleaned = regex.replace_all(&cleaned, *replacement).to_string();
        }

        cleaned = self.normalize_abbreviations(&cleaned);

        // Collapse whitespace last, preserving the blank lines that separate
        // pages as sentence pauses.
        cleaned = self.paragraph_regex.replace_all(&cleaned, "\n\n").to_string();
        cleaned = self.space_regex.replace_all(&cleaned, " ").to_string();

        cleaned.trim().to_string()
    }

    fn normalize_abbreviations(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Abbreviations espeak pronounces badly when left as-is
        let abbreviations = [
            ("Mr.", "Mister"),
            ("Mrs.", "Missus"),
            ("Dr.", "Doctor"),
            ("Prof.", "Professor"),
            ("St.", "Saint"),
            ("vs.", "versus"),
            ("etc.", "etcetera"),
            ("i.e.", "that is"),
            ("e.g.", "for example"),
        ];

        for (abbrev, expansion) in abbreviations {
            let pattern = format!(r"\b{}", regex::escape(abbrev));
            let regex = Regex::new(&pattern).unwrap();
            result = regex.replace_all(&result, expansion).to_string();
        }

        result
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}
