use thiserror::Error;

use super::node::MAX_SUFFIX_SIZE;

///////////////////////////////
/// Failures surfaced by the trie. Everything is reported to the caller,
/// nothing is retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("sequence must consist only of ASCII characters")]
    NotAscii,

    #[error("sequences larger than {} bytes cannot be stored in the trie", MAX_SUFFIX_SIZE)]
    SequenceTooLong,

    #[error("alphabet should consist of unique characters, character '{0}' was repeated")]
    RepeatedCharacter(char),

    #[error("maximum alphabet size exceeded")]
    AlphabetFull,

    #[error("no sequences left in the trie")]
    Empty,

    /// A broken internal invariant. The trie stays safe to drop but should
    /// not be used further.
    #[error("trie corrupted: {0}")]
    Corruption(&'static str),
}
