use super::alphabet::Alphabet;
use super::error::TrieError;
use crate::distance::within_edit;

pub(crate) const MAX_SUFFIX_SIZE: usize = 0x7FFF_FFFF;

// Accounting constants for memory_size: every node is charged a fixed
// header+count cost plus its trailing region (one pointer-sized slot per
// child for interior nodes, one byte per suffix byte for leaves).
const NODE_BASE_BYTES: usize = 8;
const CHILD_SLOT_BYTES: usize = 8;

///////////////////////////////
/// A node in the radix trie.
///
/// Interior nodes store their children in a vector of slots indexed by
/// alphabet index. The vector only grows to the highest index that has ever
/// been assigned below this node, so sparsely populated nodes stay small.
/// A leaf stores the remainder of its sequence as an inline suffix instead
/// of a chain of single-child nodes.
///
/// A count higher than 0 signifies that sequences end at this node. Nodes
/// with a count are not necessarily leaves, as the stored sequences may be
/// of unequal length.
pub(crate) struct TrieNode {
    count: u32,
    kind: NodeKind,
}

pub(crate) enum NodeKind {
    Leaf(Vec<u8>),
    Interior(Vec<Option<Box<TrieNode>>>),
}

fn child_at(children: &[Option<Box<TrieNode>>], index: usize) -> Option<&TrieNode> {
    children.get(index).and_then(|slot| slot.as_deref())
}

impl TrieNode {
    fn new_leaf(suffix: &[u8], count: u32) -> TrieNode {
        TrieNode {
            count,
            kind: NodeKind::Leaf(suffix.to_vec()),
        }
    }

    ///////////////////////////////
    /// Add a sequence to the node in this slot, installing a fresh leaf when
    /// the slot is empty. `count` sequences are added at once.
    ///
    /// The slot is a mutable reference to the owning pointer so the node can
    /// be replaced wholesale without the parent having to know.
    pub(crate) fn add_sequence(
        slot: &mut Option<Box<TrieNode>>,
        sequence: &[u8],
        count: u32,
        alphabet: &mut Alphabet,
    ) -> Result<(), TrieError> {
        let Some(node) = slot.as_deref_mut() else {
            *slot = Some(Box::new(TrieNode::new_leaf(sequence, count)));
            return Ok(());
        };
        if let NodeKind::Leaf(suffix) = &mut node.kind {
            if suffix.as_slice() == sequence {
                node.count += count;
                return Ok(());
            }
            // A second sequence wants to share this leaf's path. Convert the
            // leaf into an empty interior node and re-insert the stored
            // suffix below it, then fall through to insert `sequence`.
            let saved_suffix = std::mem::take(suffix);
            let saved_count = std::mem::replace(&mut node.count, 0);
            node.kind = NodeKind::Interior(Vec::new());
            Self::add_sequence(slot, &saved_suffix, saved_count, alphabet)?;
        }

        let node = slot.as_deref_mut().expect("slot emptied during insert");
        if sequence.is_empty() {
            // The sequence ends exactly at this interior node.
            node.count += count;
            return Ok(());
        }
        let index = alphabet.index_or_insert(sequence[0])?;
        let NodeKind::Interior(children) = &mut node.kind else {
            unreachable!("leaf was split above");
        };
        if index >= children.len() {
            children.resize_with(index + 1, || None);
        }
        Self::add_sequence(&mut children[index], &sequence[1..], count, alphabet)
    }

    ///////////////////////////////
    /// Delete a sequence, returning the count that was stored for it, or
    /// None when the sequence is not present.
    ///
    /// Interior nodes whose children all became empty are pruned on the way
    /// out: converted to an empty-suffix leaf when sequences still end
    /// there, removed entirely otherwise. Dead-end nodes would break the
    /// search routines.
    pub(crate) fn delete_sequence(
        slot: &mut Option<Box<TrieNode>>,
        sequence: &[u8],
        alphabet: &Alphabet,
    ) -> Option<u32> {
        let node = slot.as_deref_mut()?;
        if let NodeKind::Leaf(suffix) = &node.kind {
            if suffix.as_slice() != sequence {
                return None;
            }
            let count = node.count;
            *slot = None;
            return Some(count);
        }

        let NodeKind::Interior(children) = &mut node.kind else {
            unreachable!("leaf handled above");
        };
        if sequence.is_empty() {
            if node.count == 0 {
                return None;
            }
            return Some(std::mem::replace(&mut node.count, 0));
        }
        let index = alphabet.index_of(sequence[0])?;
        let child_slot = children.get_mut(index)?;
        let removed = Self::delete_sequence(child_slot, &sequence[1..], alphabet)?;

        if children.iter().all(|child| child.is_none()) {
            let count = node.count;
            if count > 0 {
                *slot = Some(Box::new(TrieNode::new_leaf(&[], count)));
            } else {
                *slot = None;
            }
        }
        Some(removed)
    }

    ///////////////////////////////
    /// Find the nearest stored sequence within `budget` Hamming distance.
    ///
    /// Returns the count and length of the located sequence, writing its
    /// literal bytes into `buffer` when one is given. The matching child is
    /// always tried first (at no cost), then the other children in ascending
    /// alphabet index order, which makes the search deterministic.
    pub(crate) fn find_nearest(
        &self,
        sequence: &[u8],
        budget: u32,
        alphabet: &Alphabet,
        mut buffer: Option<&mut [u8]>,
    ) -> Option<(u32, usize)> {
        match &self.kind {
            NodeKind::Leaf(suffix) => {
                if sequence.len() != suffix.len() {
                    // Hamming is only valid for sequences of the same length.
                    return None;
                }
                let mismatches = sequence
                    .iter()
                    .zip(suffix)
                    .filter(|(a, b)| a != b)
                    .count();
                if mismatches > budget as usize || self.count == 0 {
                    return None;
                }
                if let Some(buffer) = buffer {
                    buffer[..suffix.len()].copy_from_slice(suffix);
                }
                Some((self.count, suffix.len()))
            }
            NodeKind::Interior(children) => {
                if sequence.is_empty() {
                    return (self.count > 0).then_some((self.count, 0));
                }
                let character = sequence[0];
                let matching = alphabet.index_of(character);
                if let Some(child) = matching.and_then(|index| child_at(children, index)) {
                    if let Some(buffer) = buffer.as_deref_mut() {
                        buffer[0] = character;
                    }
                    let rest = buffer.as_deref_mut().map(|b| &mut b[1..]);
                    if let Some((count, length)) =
                        child.find_nearest(&sequence[1..], budget, alphabet, rest)
                    {
                        return Some((count, length + 1));
                    }
                }
                // Mismatch: try every other child, one point of budget down.
                if budget == 0 {
                    return None;
                }
                for (index, child) in children.iter().enumerate() {
                    if matching == Some(index) {
                        continue;
                    }
                    let Some(child) = child.as_deref() else { continue };
                    if let Some(buffer) = buffer.as_deref_mut() {
                        buffer[0] = alphabet.character_at(index);
                    }
                    let rest = buffer.as_deref_mut().map(|b| &mut b[1..]);
                    if let Some((count, length)) =
                        child.find_nearest(&sequence[1..], budget - 1, alphabet, rest)
                    {
                        return Some((count, length + 1));
                    }
                }
                None
            }
        }
    }

    ///////////////////////////////
    /// Find the nearest stored sequence within `budget` edit distance. The
    /// located sequence may differ in length from the query.
    ///
    /// Branch order on a mismatch: substitution over the other children,
    /// then insertion (descend a child without consuming the query), then
    /// deletion (skip a query byte without descending).
    pub(crate) fn find_nearest_edit(
        &self,
        sequence: &[u8],
        budget: u32,
        alphabet: &Alphabet,
        mut buffer: Option<&mut [u8]>,
    ) -> Option<(u32, usize)> {
        match &self.kind {
            NodeKind::Leaf(suffix) => {
                if sequence.len().abs_diff(suffix.len()) > budget as usize {
                    return None;
                }
                if !within_edit(sequence, suffix, budget) || self.count == 0 {
                    return None;
                }
                if let Some(buffer) = buffer {
                    buffer[..suffix.len()].copy_from_slice(suffix);
                }
                Some((self.count, suffix.len()))
            }
            NodeKind::Interior(children) => {
                if sequence.is_empty() && self.count > 0 {
                    return Some((self.count, 0));
                }
                let matching = sequence.first().and_then(|&c| alphabet.index_of(c));
                if let Some(child) = matching.and_then(|index| child_at(children, index)) {
                    if let Some(buffer) = buffer.as_deref_mut() {
                        buffer[0] = sequence[0];
                    }
                    let rest = buffer.as_deref_mut().map(|b| &mut b[1..]);
                    if let Some((count, length)) =
                        child.find_nearest_edit(&sequence[1..], budget, alphabet, rest)
                    {
                        return Some((count, length + 1));
                    }
                }
                if budget == 0 {
                    return None;
                }
                // Substitution: consume the query byte, descend another child.
                if !sequence.is_empty() {
                    for (index, child) in children.iter().enumerate() {
                        if matching == Some(index) {
                            continue;
                        }
                        let Some(child) = child.as_deref() else { continue };
                        if let Some(buffer) = buffer.as_deref_mut() {
                            buffer[0] = alphabet.character_at(index);
                        }
                        let rest = buffer.as_deref_mut().map(|b| &mut b[1..]);
                        if let Some((count, length)) =
                            child.find_nearest_edit(&sequence[1..], budget - 1, alphabet, rest)
                        {
                            return Some((count, length + 1));
                        }
                    }
                }
                // Insertion: the stored sequence has an extra character,
                // descend without consuming the query.
                for (index, child) in children.iter().enumerate() {
                    let Some(child) = child.as_deref() else { continue };
                    if let Some(buffer) = buffer.as_deref_mut() {
                        buffer[0] = alphabet.character_at(index);
                    }
                    let rest = buffer.as_deref_mut().map(|b| &mut b[1..]);
                    if let Some((count, length)) =
                        child.find_nearest_edit(sequence, budget - 1, alphabet, rest)
                    {
                        return Some((count, length + 1));
                    }
                }
                // Deletion: skip a query byte, stay on this node.
                if !sequence.is_empty() {
                    if let Some(hit) =
                        self.find_nearest_edit(&sequence[1..], budget - 1, alphabet, buffer)
                    {
                        return Some(hit);
                    }
                }
                None
            }
        }
    }

    ///////////////////////////////
    /// Write the first stored sequence, in alphabet index order, into
    /// `buffer` and return its length. None means the buffer was too small
    /// or the node is malformed; on a valid non-empty trie with a buffer of
    /// at least the maximum sequence size this cannot happen.
    pub(crate) fn get_sequence(&self, alphabet: &Alphabet, buffer: &mut [u8]) -> Option<usize> {
        match &self.kind {
            NodeKind::Leaf(suffix) => {
                if suffix.len() > buffer.len() {
                    return None;
                }
                buffer[..suffix.len()].copy_from_slice(suffix);
                Some(suffix.len())
            }
            NodeKind::Interior(children) => {
                if buffer.is_empty() {
                    return None;
                }
                for (index, child) in children.iter().enumerate() {
                    let Some(child) = child.as_deref() else { continue };
                    buffer[0] = alphabet.character_at(index);
                    let rest = child.get_sequence(alphabet, &mut buffer[1..])?;
                    return Some(1 + rest);
                }
                // No children left: only valid when sequences end here.
                (self.count > 0).then_some(0)
            }
        }
    }

    /// Byte cost of the subtree under the fixed accounting scheme.
    pub(crate) fn memory_size(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(suffix) => NODE_BASE_BYTES + suffix.len(),
            NodeKind::Interior(children) => {
                let mut size = NODE_BASE_BYTES + CHILD_SLOT_BYTES * children.len();
                for child in children.iter().flatten() {
                    size += child.memory_size();
                }
                size
            }
        }
    }

    /// Per-layer node shape counts. Leaves land in bucket 0 of their layer,
    /// interior nodes in the bucket of their child arity.
    pub(crate) fn collect_stats(&self, layer: usize, stats: &mut [Vec<usize>]) {
        match &self.kind {
            NodeKind::Leaf(_) => stats[layer][0] += 1,
            NodeKind::Interior(children) => {
                stats[layer][children.len()] += 1;
                for child in children.iter().flatten() {
                    child.collect_stats(layer + 1, stats);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(sequences: &[&[u8]]) -> (Option<Box<TrieNode>>, Alphabet) {
        let mut alphabet = Alphabet::new();
        let mut root = None;
        for sequence in sequences {
            TrieNode::add_sequence(&mut root, sequence, 1, &mut alphabet).unwrap();
        }
        (root, alphabet)
    }

    fn total_count(node: &TrieNode) -> u64 {
        let mut sum = node.count as u64;
        if let NodeKind::Interior(children) = &node.kind {
            for child in children.iter().flatten() {
                sum += total_count(child);
            }
        }
        sum
    }

    #[test]
    fn test_single_sequence_is_one_leaf() {
        let (root, _) = build(&[b"ACGT"]);
        let root = root.unwrap();
        assert!(matches!(&root.kind, NodeKind::Leaf(suffix) if suffix == b"ACGT"));
        assert_eq!(root.count, 1);
        assert_eq!(root.memory_size(), NODE_BASE_BYTES + 4);
    }

    #[test]
    fn test_exact_duplicate_bumps_count() {
        let (root, _) = build(&[b"ACGT", b"ACGT", b"ACGT"]);
        let root = root.unwrap();
        assert_eq!(root.count, 3);
        assert_eq!(total_count(&root), 3);
    }

    #[test]
    fn test_split_on_shared_prefix() {
        let (root, alphabet) = build(&[b"ACGTACGT", b"ACGTAAAA"]);
        let root = root.unwrap();
        assert_eq!(total_count(&root), 2);
        // Chain of interior nodes over the shared prefix, two leaves below.
        // Arities along the path follow the assigned alphabet indices:
        // A=0, C=1, G=2, T=3.
        let expected = (NODE_BASE_BYTES + CHILD_SLOT_BYTES) // root, arity 1
            + (NODE_BASE_BYTES + 2 * CHILD_SLOT_BYTES) // "A", arity 2
            + (NODE_BASE_BYTES + 3 * CHILD_SLOT_BYTES) // "AC", arity 3
            + (NODE_BASE_BYTES + 4 * CHILD_SLOT_BYTES) // "ACG", arity 4
            + (NODE_BASE_BYTES + CHILD_SLOT_BYTES) // "ACGT", arity 1
            + (NODE_BASE_BYTES + 2 * CHILD_SLOT_BYTES) // "ACGTA", arity 2
            + (NODE_BASE_BYTES + 2) // leaf "AA"
            + (NODE_BASE_BYTES + 2); // leaf "GT"
        assert_eq!(root.memory_size(), expected);
        assert!(root
            .find_nearest(b"ACGTACGT", 0, &alphabet, None)
            .is_some());
        assert!(root
            .find_nearest(b"ACGTAAAA", 0, &alphabet, None)
            .is_some());
    }

    #[test]
    fn test_split_preserves_duplicate_count() {
        let (root, alphabet) = build(&[b"ACGT", b"ACGT", b"ACGA"]);
        let root = root.unwrap();
        assert_eq!(total_count(&root), 3);
        let (count, length) = root.find_nearest(b"ACGT", 0, &alphabet, None).unwrap();
        assert_eq!((count, length), (2, 4));
    }

    #[test]
    fn test_delete_leaf_prunes_chain() {
        let (mut root, alphabet) = build(&[b"ACGTACGT", b"ACGTAAAA"]);
        let before = root.as_deref().unwrap().memory_size();
        let removed = TrieNode::delete_sequence(&mut root, b"ACGTACGT", &alphabet);
        assert_eq!(removed, Some(1));
        // The other branch keeps the chain alive, only the leaf is gone.
        let after = root.as_deref().unwrap().memory_size();
        assert_eq!(after, before - (NODE_BASE_BYTES + 2));
        assert!(root
            .as_deref()
            .unwrap()
            .find_nearest(b"ACGTACGT", 0, &alphabet, None)
            .is_none());
        // Removing the last sequence collapses everything.
        let removed = TrieNode::delete_sequence(&mut root, b"ACGTAAAA", &alphabet);
        assert_eq!(removed, Some(1));
        assert!(root.is_none());
    }

    #[test]
    fn test_delete_interior_count_becomes_empty_suffix_leaf() {
        // "GATTA" ends on the interior node above the leaf for "GATTACA".
        let (mut root, alphabet) = build(&[b"GATTACA", b"GATTA"]);
        let removed = TrieNode::delete_sequence(&mut root, b"GATTACA", &alphabet);
        assert_eq!(removed, Some(1));
        // The node for "GATTA" lost its only child but still holds a count,
        // so it must live on as an empty-suffix leaf.
        let root_node = root.as_deref().unwrap();
        assert_eq!(total_count(root_node), 1);
        let mut buffer = [0u8; 16];
        let length = root_node.get_sequence(&alphabet, &mut buffer).unwrap();
        assert_eq!(&buffer[..length], b"GATTA");
    }

    #[test]
    fn test_delete_missing_sequence_fails() {
        let (mut root, alphabet) = build(&[b"ACGT"]);
        assert_eq!(TrieNode::delete_sequence(&mut root, b"ACGA", &alphabet), None);
        assert_eq!(TrieNode::delete_sequence(&mut root, b"ACG", &alphabet), None);
        assert_eq!(TrieNode::delete_sequence(&mut root, b"AAAA", &alphabet), None);
        assert_eq!(total_count(root.as_deref().unwrap()), 1);
    }

    #[test]
    fn test_find_nearest_writes_witness() {
        let (root, alphabet) = build(&[b"AAA", b"AAC", b"TTT"]);
        let mut root = root;
        TrieNode::delete_sequence(&mut root, b"AAA", &alphabet).unwrap();
        let root = root.as_deref().unwrap();
        let mut buffer = [0u8; 8];
        let (count, length) = root
            .find_nearest(b"AAA", 1, &alphabet, Some(&mut buffer))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(&buffer[..length], b"AAC");
    }

    #[test]
    fn test_find_nearest_respects_budget() {
        let (root, alphabet) = build(&[b"GATTACA"]);
        let root = root.as_deref().unwrap();
        assert!(root.find_nearest(b"GATTACA", 0, &alphabet, None).is_some());
        assert!(root.find_nearest(b"AATTACA", 1, &alphabet, None).is_some());
        assert!(root.find_nearest(b"GACCACA", 2, &alphabet, None).is_some());
        assert!(root.find_nearest(b"GACCACA", 1, &alphabet, None).is_none());
        assert!(root.find_nearest(b"GATTACC", 0, &alphabet, None).is_none());
    }

    #[test]
    fn test_find_nearest_edit_handles_length_gaps() {
        let (root, alphabet) = build(&[b"ACGT"]);
        let root = root.as_deref().unwrap();
        assert!(root.find_nearest_edit(b"ACT", 1, &alphabet, None).is_some());
        assert!(root.find_nearest_edit(b"ACT", 0, &alphabet, None).is_none());
        assert!(root
            .find_nearest_edit(b"ACGTT", 1, &alphabet, None)
            .is_some());
        assert!(root.find_nearest(b"ACT", 1, &alphabet, None).is_none());
    }

    #[test]
    fn test_find_nearest_edit_through_interior_nodes() {
        let (root, alphabet) = build(&[b"ACGT", b"ACGA"]);
        let root = root.as_deref().unwrap();
        let mut buffer = [0u8; 8];
        // One deletion away from "ACGA", the first stored sequence in
        // alphabet order.
        let (count, length) = root
            .find_nearest_edit(b"ACG", 1, &alphabet, Some(&mut buffer))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(&buffer[..length], b"ACGA");
    }

    #[test]
    fn test_get_sequence_takes_first_in_alphabet_order() {
        let (root, alphabet) = build(&[b"TTT", b"GGA", b"GGC"]);
        let root = root.as_deref().unwrap();
        let mut buffer = [0u8; 8];
        let length = root.get_sequence(&alphabet, &mut buffer).unwrap();
        // T was seen first and holds index 0.
        assert_eq!(&buffer[..length], b"TTT");
    }

    #[test]
    fn test_stats_buckets() {
        let (root, alphabet) = build(&[b"ACGTACGT", b"ACGTAAAA"]);
        let root = root.as_deref().unwrap();
        let mut stats = vec![vec![0usize; alphabet.len() + 1]; 9];
        root.collect_stats(0, &mut stats);
        assert_eq!(stats[0][1], 1); // root, arity 1
        assert_eq!(stats[4][1], 1); // "ACGT", arity 1
        assert_eq!(stats[5][2], 1); // "ACGTA", arity 2
        assert_eq!(stats[6][0], 2); // both leaves
        let nodes: usize = stats.iter().flatten().sum();
        assert_eq!(nodes, 8);
    }
}
