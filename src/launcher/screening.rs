use std::collections::HashSet;

const BASE_WORDS: &[&str] = &[
    "arse", "arsehole", "asshole", "bastard", "bitch", "bollocks", "bullshit", "crap", "cunt",
    "damn", "dick", "dickhead", "fuck", "fucker", "fucking", "motherfucker", "piss", "prick",
    "shit", "shitty", "slut", "twat", "wanker", "whore",
];

/// Flags titles and descriptions containing blocked words.
#[derive(Debug, Clone)]
pub struct CurseWordFilter {
    words: HashSet<String>,
}

impl Default for CurseWordFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl CurseWordFilter {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = BASE_WORDS
            .iter()
            .map(|word| word.to_string())
            .chain(
                extra
                    .into_iter()
                    .map(|word| word.as_ref().trim().to_ascii_lowercase())
                    .filter(|word| !word.is_empty()),
            )
            .collect();
        Self { words }
    }

    /// Punctuation is dropped before splitting on spaces, so "sh!t" reads as "sht".
    pub fn contains_curse_word(&self, text: &str) -> bool {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
            .collect();
        cleaned
            .split(' ')
            .filter(|word| !word.is_empty())
            .any(|word| self.words.contains(&word.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_whole_words_only() {
        let filter = CurseWordFilter::default();
        assert!(filter.contains_curse_word("what the hell, damn!"));
        assert!(filter.contains_curse_word("DAMN it"));
        assert!(!filter.contains_curse_word("Amsterdam fortunes"));
        assert!(!filter.contains_curse_word("A perfectly fine title"));
        assert!(!filter.contains_curse_word(""));
    }

    #[test]
    fn extra_words_extend_the_list() {
        let filter = CurseWordFilter::new(["Scam", "  "]);
        assert!(filter.contains_curse_word("not a scam."));
        assert!(!CurseWordFilter::default().contains_curse_word("not a scam."));
    }
}
