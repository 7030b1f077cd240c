use clap::ValueEnum;
use itertools::Itertools;

use crate::distance::within_distance;

///////////////////////////////
/// How to select the representative reads of a cluster of near-duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DissectionMethod {
    /// Keep only the read with the highest count.
    #[value(name = "highest_count")]
    HighestCount,
    /// Keep the read with the highest count, drop everything adjacent to it
    /// and repeat on the remainder.
    #[value(name = "adjacency")]
    Adjacency,
    /// Like adjacency, but only absorb reads whose counts are low enough to
    /// be PCR or sequencing artifacts of the template chain.
    #[value(name = "directional")]
    Directional,
}

impl DissectionMethod {
    pub fn dissect(
        &self,
        cluster: &[(u32, Vec<u8>)],
        max_distance: u32,
        use_edit: bool,
    ) -> Vec<Vec<u8>> {
        match self {
            DissectionMethod::HighestCount => dissect_highest_count(cluster),
            DissectionMethod::Adjacency => dissect_adjacency(cluster, max_distance, use_edit),
            DissectionMethod::Directional => dissect_directional(cluster, max_distance, use_edit),
        }
    }
}

/// Select the read with the highest count. Yields exactly one read.
fn dissect_highest_count(cluster: &[(u32, Vec<u8>)]) -> Vec<Vec<u8>> {
    match cluster.iter().sorted().next_back() {
        Some((_, sequence)) => vec![sequence.clone()],
        None => Vec::new(),
    }
}

/// Take the read with the highest count, drop all reads directly adjacent
/// within `max_distance`, and repeat on what is left.
fn dissect_adjacency(
    cluster: &[(u32, Vec<u8>)],
    max_distance: u32,
    use_edit: bool,
) -> Vec<Vec<u8>> {
    let mut remaining: Vec<&(u32, Vec<u8>)> = cluster.iter().sorted().rev().collect();
    let mut representatives = Vec::new();
    while let Some((&first, rest)) = remaining.split_first() {
        let (_, template) = first;
        representatives.push(template.clone());
        remaining = rest
            .iter()
            .copied()
            .filter(|(_, sequence)| !within_distance(template, sequence, max_distance, use_edit))
            .collect();
    }
    representatives
}

/// Take the read with the highest count as the origin of a template chain.
/// Reads within `max_distance` of a chain member whose count `n` satisfies
/// `2n - 1 <= count of that member` are assumed to be amplification or
/// sequencing artifacts and absorbed into the chain. One read is emitted
/// per chain; the leftovers seed new chains.
fn dissect_directional(
    cluster: &[(u32, Vec<u8>)],
    max_distance: u32,
    use_edit: bool,
) -> Vec<Vec<u8>> {
    let mut remaining: Vec<&(u32, Vec<u8>)> = cluster.iter().sorted().collect();
    let mut representatives = Vec::new();
    while let Some(origin) = remaining.pop() {
        let mut templates = vec![origin];
        let mut template_index = 0;
        while template_index < templates.len() && !remaining.is_empty() {
            let (template_count, template_sequence) = templates[template_index];
            let mut distinct = Vec::new();
            for item in std::mem::take(&mut remaining) {
                let (count, sequence) = item;
                if 2 * count - 1 <= *template_count
                    && within_distance(template_sequence, sequence, max_distance, use_edit)
                {
                    templates.push(item);
                } else {
                    distinct.push(item);
                }
            }
            remaining = distinct;
            template_index += 1;
        }
        representatives.push(origin.1.clone());
    }
    representatives
}
