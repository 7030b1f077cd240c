use super::alphabet::Alphabet;
use super::error::TrieError;
use super::node::{TrieNode, MAX_SUFFIX_SIZE};

///////////////////////////////
/// A radix trie over ASCII sequences with approximate lookup.
///
/// Sequences are stored with a per-sequence count; lookups can tolerate a
/// bounded number of mismatches (Hamming) or edits (Levenshtein). Whole
/// clusters of neighbouring sequences can be popped off the trie at once,
/// which is how deduplication consumes it.
pub struct Trie {
    alphabet: Alphabet,
    root: Option<Box<TrieNode>>,
    number_of_sequences: usize,
    max_sequence_size: usize,
    // Scratch space for sequence extraction and search witnesses, resized
    // to the largest sequence seen and reused across calls.
    sequence_buffer: Vec<u8>,
}

impl Trie {
    pub fn new() -> Trie {
        Trie {
            alphabet: Alphabet::new(),
            root: None,
            number_of_sequences: 0,
            max_sequence_size: 0,
            sequence_buffer: Vec::new(),
        }
    }

    /// Characters in `seed` get alphabet indices 0, 1, ... in seed order,
    /// fixing the order in which sequences are extracted.
    pub fn with_alphabet(seed: &str) -> Result<Trie, TrieError> {
        if !seed.is_ascii() {
            return Err(TrieError::NotAscii);
        }
        Ok(Trie {
            alphabet: Alphabet::from_seed(seed.as_bytes())?,
            ..Trie::new()
        })
    }

    fn check_sequence(sequence: &[u8]) -> Result<(), TrieError> {
        if !sequence.is_ascii() {
            return Err(TrieError::NotAscii);
        }
        if sequence.len() > MAX_SUFFIX_SIZE {
            return Err(TrieError::SequenceTooLong);
        }
        Ok(())
    }

    pub fn add_sequence(&mut self, sequence: &[u8]) -> Result<(), TrieError> {
        Self::check_sequence(sequence)?;
        TrieNode::add_sequence(&mut self.root, sequence, 1, &mut self.alphabet)?;
        self.number_of_sequences += 1;
        self.max_sequence_size = self.max_sequence_size.max(sequence.len());
        Ok(())
    }

    /// Check whether a sequence within `max_distance` of `sequence` is
    /// present. Under Hamming distance (the default) sequences of unequal
    /// length are never equal; `use_edit` switches to edit distance.
    pub fn contains_sequence(
        &self,
        sequence: &[u8],
        max_distance: u32,
        use_edit: bool,
    ) -> Result<bool, TrieError> {
        Self::check_sequence(sequence)?;
        let Some(root) = self.root.as_deref() else {
            return Ok(false);
        };
        let hit = if use_edit {
            root.find_nearest_edit(sequence, max_distance, &self.alphabet, None)
        } else {
            root.find_nearest(sequence, max_distance, &self.alphabet, None)
        };
        Ok(hit.is_some())
    }

    ///////////////////////////////
    /// Remove and return a cluster of sequences that are all connected
    /// through the within-`max_distance` relation, as (count, sequence)
    /// pairs.
    ///
    /// Starting from the first sequence in alphabet order, neighbours of
    /// every cluster member are searched for and moved into the cluster
    /// until no further neighbour is found, so the cluster keeps expanding
    /// through chains of near-duplicates.
    pub fn pop_cluster(
        &mut self,
        max_distance: u32,
        use_edit: bool,
    ) -> Result<Vec<(u32, Vec<u8>)>, TrieError> {
        if self.root.is_none() {
            return Err(TrieError::Empty);
        }
        if self.sequence_buffer.len() != self.max_sequence_size {
            self.sequence_buffer.resize(self.max_sequence_size, 0);
        }

        // Get an initial sequence to build the cluster around.
        let seed_length = self
            .root
            .as_deref()
            .and_then(|root| root.get_sequence(&self.alphabet, &mut self.sequence_buffer))
            .ok_or(TrieError::Corruption(
                "no sequence found in a non-empty trie",
            ))?;
        let seed = self.sequence_buffer[..seed_length].to_vec();
        let seed_count = TrieNode::delete_sequence(&mut self.root, &seed, &self.alphabet)
            .ok_or(TrieError::Corruption("retrieved undeletable sequence"))?;
        self.number_of_sequences -= seed_count as usize;

        let mut cluster = vec![(seed_count, seed)];
        if max_distance == 0 {
            return Ok(cluster);
        }

        // For every sequence in the cluster, keep pulling in neighbours at
        // the specified distance before moving on to the next member. The
        // search and the deletion share the sequence buffer, so the deleted
        // sequence is exactly the one that was found.
        let mut cluster_index = 0;
        while cluster_index < cluster.len() {
            let Some(root) = self.root.as_deref() else {
                break;
            };
            let template = &cluster[cluster_index].1;
            let hit = if use_edit {
                root.find_nearest_edit(
                    template,
                    max_distance,
                    &self.alphabet,
                    Some(&mut self.sequence_buffer),
                )
            } else {
                root.find_nearest(
                    template,
                    max_distance,
                    &self.alphabet,
                    Some(&mut self.sequence_buffer),
                )
            };
            match hit {
                Some((count, length)) => {
                    let neighbour = self.sequence_buffer[..length].to_vec();
                    let removed =
                        TrieNode::delete_sequence(&mut self.root, &neighbour, &self.alphabet)
                            .ok_or(TrieError::Corruption("retrieved undeletable sequence"))?;
                    self.number_of_sequences -= removed as usize;
                    cluster.push((count, neighbour));
                }
                None => cluster_index += 1,
            }
        }
        Ok(cluster)
    }

    /// Byte cost of all nodes, exact under the trie's accounting scheme.
    pub fn memory_size(&self) -> usize {
        self.root.as_deref().map_or(0, |root| root.memory_size())
    }

    /// One row per trie layer; bucket 0 counts leaves, bucket k counts
    /// interior nodes of arity k.
    pub fn raw_stats(&self) -> Vec<Vec<usize>> {
        let mut stats =
            vec![vec![0usize; self.alphabet.len() + 1]; self.max_sequence_size + 1];
        if let Some(root) = self.root.as_deref() {
            root.collect_stats(0, &mut stats);
        }
        stats
    }

    /// The alphabet as a string in index order.
    pub fn alphabet(&self) -> String {
        self.alphabet.as_string()
    }

    pub fn number_of_sequences(&self) -> usize {
        self.number_of_sequences
    }
}

impl Default for Trie {
    fn default() -> Trie {
        Trie::new()
    }
}
