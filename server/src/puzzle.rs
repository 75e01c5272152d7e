//! Puzzle source backed by plain word-list files
//!
//! A lexicon named `NWL23` is read from `<data_dir>/NWL23.txt`: one word per
//! line, case-insensitive, blank lines and `#` comments ignored. Words are
//! grouped by alphagram the first time a lexicon is requested and the index
//! is kept for the life of the server.

use log::{info, warn};
use rand::seq::SliceRandom;
use shared::alphagram_of;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("unknown lexicon {0}")]
    UnknownLexicon(String),
    #[error("no {word_length}-letter puzzle in lexicon {lexicon}")]
    NotFound { lexicon: String, word_length: usize },
    #[error("failed to read lexicon {lexicon}: {source}")]
    Io {
        lexicon: String,
        #[source]
        source: std::io::Error,
    },
}

/// One scrambled letter group and every word it spells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    pub alphagram: String,
    /// Sorted, deduplicated
    pub solutions: Vec<String>,
}

pub trait PuzzleSource {
    fn lookup(&mut self, lexicon: &str, word_length: usize) -> Result<Puzzle, PuzzleError>;
}

/// Alphagram index of a single lexicon
#[derive(Debug, Default)]
pub struct LexiconIndex {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl LexiconIndex {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            if !word.chars().all(|c| c.is_alphabetic()) {
                continue;
            }
            let word = word.to_uppercase();
            groups.entry(alphagram_of(&word)).or_default().insert(word);
        }
        Self { groups }
    }

    pub fn word_count(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    pub fn alphagram_count(&self) -> usize {
        self.groups.len()
    }

    pub fn solutions_for(&self, alphagram: &str) -> Option<Vec<String>> {
        self.groups
            .get(alphagram)
            .map(|words| words.iter().cloned().collect())
    }

    /// Picks a random alphagram with `word_length` letters
    pub fn random_puzzle<R: rand::Rng>(&self, rng: &mut R, word_length: usize) -> Option<Puzzle> {
        let candidates: Vec<&String> = self
            .groups
            .keys()
            .filter(|alphagram| alphagram.chars().count() == word_length)
            .collect();
        let alphagram = candidates.choose(rng)?;
        let solutions = self.solutions_for(alphagram)?;
        Some(Puzzle {
            alphagram: (*alphagram).clone(),
            solutions,
        })
    }
}

/// Lazily loads lexicons from a data directory
pub struct LexiconPuzzles {
    data_dir: PathBuf,
    lexicons: HashMap<String, LexiconIndex>,
}

impl LexiconPuzzles {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lexicons: HashMap::new(),
        }
    }

    /// Registers an already-built lexicon, bypassing the data directory
    pub fn with_lexicon(mut self, name: &str, index: LexiconIndex) -> Self {
        self.lexicons.insert(name.to_string(), index);
        self
    }

    fn is_valid_name(lexicon: &str) -> bool {
        !lexicon.is_empty()
            && lexicon
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    fn load(&mut self, lexicon: &str) -> Result<&LexiconIndex, PuzzleError> {
        if !self.lexicons.contains_key(lexicon) {
            if !Self::is_valid_name(lexicon) {
                return Err(PuzzleError::UnknownLexicon(lexicon.to_string()));
            }
            let path = self.data_dir.join(format!("{}.txt", lexicon));
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(PuzzleError::UnknownLexicon(lexicon.to_string()));
                }
                Err(source) => {
                    return Err(PuzzleError::Io {
                        lexicon: lexicon.to_string(),
                        source,
                    })
                }
            };
            let index = LexiconIndex::from_words(contents.lines());
            info!(
                "Loaded lexicon {} from {}: {} words, {} alphagrams",
                lexicon,
                path.display(),
                index.word_count(),
                index.alphagram_count()
            );
            self.lexicons.insert(lexicon.to_string(), index);
        }

        self.lexicons
            .get(lexicon)
            .ok_or_else(|| PuzzleError::UnknownLexicon(lexicon.to_string()))
    }
}

impl PuzzleSource for LexiconPuzzles {
    fn lookup(&mut self, lexicon: &str, word_length: usize) -> Result<Puzzle, PuzzleError> {
        let index = self.load(lexicon)?;
        index
            .random_puzzle(&mut rand::thread_rng(), word_length)
            .ok_or_else(|| {
                warn!("No {}-letter puzzle in lexicon {}", word_length, lexicon);
                PuzzleError::NotFound {
                    lexicon: lexicon.to_string(),
                    word_length,
                }
            })
    }
}
