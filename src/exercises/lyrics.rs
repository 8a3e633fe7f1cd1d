//! Lyric assignment: one sung word per target note.
//!
//! Words are grouped by their main vowel so a phrase can be sung on open,
//! singable syllables. Assignment is keyed by its own seed, separate from the
//! phrase seed, so melody and words can be varied independently.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;

/// Token used when every candidate word has already been sung this session.
pub const FILLER_WORD: &str = "la";

/// Candidates drawn per note before giving up on an unused word.
const OVERSAMPLE: usize = 8;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VowelGroup {
    Ah,
    Eh,
    Ee,
    Oh,
    Oo,
}

impl VowelGroup {
    pub const ALL: [VowelGroup; 5] = [
        VowelGroup::Ah,
        VowelGroup::Eh,
        VowelGroup::Ee,
        VowelGroup::Oh,
        VowelGroup::Oo,
    ];

    pub fn words(&self) -> &'static [&'static str] {
        match self {
            VowelGroup::Ah => &["far", "calm", "star", "heart", "dawn", "song", "ma", "father"],
            VowelGroup::Eh => &["bell", "rest", "friend", "ten", "red", "bread", "left", "yes"],
            VowelGroup::Ee => &["see", "tree", "free", "key", "dream", "sweet", "me", "leaf"],
            VowelGroup::Oh => &["home", "glow", "snow", "road", "boat", "stone", "go", "low"],
            VowelGroup::Oo => &["moon", "blue", "true", "you", "soon", "room", "through", "new"],
        }
    }
}

fn draw_word(rng: &mut SeededRng) -> &'static str {
    let group = rng.pick(&VowelGroup::ALL).copied().unwrap_or(VowelGroup::Ah);
    rng.pick(group.words()).copied().unwrap_or(FILLER_WORD)
}

/// Exactly one word per note. Repeats are allowed.
pub fn assign_lyrics(note_count: usize, seed: u32) -> Vec<String> {
    let mut rng = SeededRng::new(seed);
    (0..note_count).map(|_| draw_word(&mut rng).to_string()).collect()
}

/// Session-scoped word memory for the "no repeat within session" mode.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LyricBook {
    used: HashSet<String>,
}

impl LyricBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// One word per note, avoiding anything already sung this session.
    /// Falls back to `FILLER_WORD` when no fresh word turns up.
    pub fn assign_unique(&mut self, note_count: usize, seed: u32) -> Vec<String> {
        let mut rng = SeededRng::new(seed);
        let mut words = Vec::with_capacity(note_count);
        for _ in 0..note_count {
            let fresh = (0..OVERSAMPLE)
                .map(|_| draw_word(&mut rng))
                .find(|w| !self.used.contains(*w));
            match fresh {
                Some(word) => {
                    self.used.insert(word.to_string());
                    words.push(word.to_string());
                }
                None => words.push(FILLER_WORD.to_string()),
            }
        }
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_word_per_note() {
        assert_eq!(assign_lyrics(12, 5).len(), 12);
        assert!(assign_lyrics(0, 5).is_empty());
    }

    #[test]
    fn test_lyrics_are_deterministic() {
        assert_eq!(assign_lyrics(10, 77), assign_lyrics(10, 77));
    }

    #[test]
    fn test_unique_words_do_not_repeat() {
        let mut book = LyricBook::new();
        let first = book.assign_unique(6, 1);
        let second = book.assign_unique(6, 2);
        let mut seen = HashSet::new();
        for w in first.iter().chain(second.iter()) {
            if w != FILLER_WORD {
                assert!(seen.insert(w.clone()), "repeated {}", w);
            }
        }
        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 6);
    }

    #[test]
    fn test_exhausted_book_uses_filler() {
        let total: usize = VowelGroup::ALL.iter().map(|g| g.words().len()).sum();
        let mut book = LyricBook::new();
        let words = book.assign_unique(total * 3, 4);
        assert_eq!(words.len(), total * 3);
        assert!(book.used_count() <= total);
        assert!(words.iter().any(|w| w == FILLER_WORD));
    }
}
