use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::Hasher;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{debug, info, log_enabled, Level};
use seq_io::fastq::OwnedRecord;

use crate::checklen::CheckSlice;
use crate::cluster::DissectionMethod;
use crate::fastq::{self, RecordTuples};
use crate::quality::{self, DEFAULT_PHRED_OFFSET};
use crate::trie::Trie;

pub struct DedupParams {
    pub input_files: Vec<PathBuf>,
    pub output_files: Vec<PathBuf>,
    pub check_slices: Option<Vec<CheckSlice>>,
    pub max_distance: u32,
    pub max_average_error_rate: f64,
    pub use_edit: bool,
    pub dissection_method: DissectionMethod,
}

struct StageTimer(Instant);

impl StageTimer {
    fn start() -> StageTimer {
        StageTimer(Instant::now())
    }

    fn lap(&mut self) -> f64 {
        let elapsed = self.0.elapsed().as_secs_f64();
        self.0 = Instant::now();
        elapsed
    }
}

/// Collapse the selected parts of a record tuple into one key.
fn build_key<'a>(
    records: &'a [OwnedRecord],
    check_slices: Option<&[CheckSlice]>,
    field: impl Fn(&'a OwnedRecord) -> &'a [u8],
) -> Vec<u8> {
    match check_slices {
        Some(slices) => records
            .iter()
            .zip(slices)
            .flat_map(|(record, slice)| slice.apply(field(record)))
            .collect(),
        None => records
            .iter()
            .flat_map(|record| field(record).iter().copied())
            .collect(),
    }
}

// The representative set stores key hashes rather than the keys themselves,
// which saves a lot of memory on large inputs.
fn key_hash(key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(key);
    hasher.finish()
}

fn render_trie_stats(trie: &Trie) -> String {
    let raw_stats = trie.raw_stats();
    let layer_size = trie.alphabet().len() + 1;
    let mut totals = vec![0usize; layer_size + 1];
    let mut out = String::new();
    out.push_str(&format!("{:<10}{:>10}", "layer", "terminal"));
    for arity in 1..layer_size {
        out.push_str(&format!("{:>10}", arity));
    }
    out.push_str(&format!("{:>10}\n", "total"));
    for (layer, row) in raw_stats.iter().enumerate() {
        let layer_total: usize = row.iter().sum();
        out.push_str(&format!("{:<10}", layer));
        for (bucket, &value) in row.iter().enumerate() {
            totals[bucket] += value;
            out.push_str(&format!("{:>10}", value));
        }
        totals[layer_size] += layer_total;
        out.push_str(&format!("{:>10}\n", layer_total));
    }
    out.push_str(&format!("{:<10}", "total"));
    for &value in &totals {
        out.push_str(&format!("{:>10}", value));
    }
    out.push('\n');

    const GIB: f64 = 1073741824.0;
    let node_memory: usize = (0..layer_size)
        .map(|arity| (8 + 8 * arity) * totals[arity])
        .sum();
    let total_memory = trie.memory_size();
    let suffix_memory = total_memory.saturating_sub(node_memory);
    out.push_str(&format!(
        "Node memory usage: {:.2} GiB\nSuffix memory usage: {:.2} GiB\nTotal memory usage: {:.2} GiB\n",
        node_memory as f64 / GIB,
        suffix_memory as f64 / GIB,
        total_memory as f64 / GIB,
    ));
    out
}

///////////////////////////////
/// Deduplicate FASTQ files in two passes: first cluster all keys in the
/// trie and select representative reads, then stream the inputs again and
/// keep one record tuple per representative.
pub fn deduplicate(params: &DedupParams) -> Result<()> {
    if params.input_files.len() != params.output_files.len() {
        bail!(
            "amount of output files ({}) must be equal to the amount of input files ({})",
            params.output_files.len(),
            params.input_files.len()
        );
    }
    if let Some(slices) = &params.check_slices {
        if slices.len() != params.input_files.len() {
            bail!(
                "amount of check lengths ({}) must be equal to the amount of input files ({})",
                slices.len(),
                params.input_files.len()
            );
        }
    }
    let check_slices = params.check_slices.as_deref();
    let filter_on_quality = params.max_average_error_rate < 1.0;
    let mut timer = StageTimer::start();

    let mut trie = Trie::with_alphabet("ACGTN").context("failed to seed the trie alphabet")?;
    let mut tuples = RecordTuples::open(&params.input_files)?;
    let mut total_records: u64 = 0;
    let mut discarded_records: u64 = 0;
    while let Some(records) = tuples.next_tuple()? {
        total_records += 1;
        if filter_on_quality {
            let scores = build_key(&records, check_slices, |record| record.qual.as_slice());
            if quality::average_error_rate(&scores, DEFAULT_PHRED_OFFSET)?
                > params.max_average_error_rate
            {
                discarded_records += 1;
                continue;
            }
        }
        let key = build_key(&records, check_slices, |record| record.seq.as_slice());
        trie.add_sequence(&key)
            .with_context(|| format!("could not store key for record {}", total_records))?;
    }
    if filter_on_quality {
        info!(
            "{} records out of {} records had an error rate higher than {} and were discarded.",
            discarded_records, total_records, params.max_average_error_rate
        );
    }
    info!(
        "Processed {} sequences. ({:.2}s)",
        trie.number_of_sequences(),
        timer.lap()
    );
    if log_enabled!(Level::Debug) {
        // The stats traversal is expensive, skip it when nobody listens.
        let stats = render_trie_stats(&trie);
        debug!("Calculated stats. ({:.2}s)", timer.lap());
        debug!("\n{}", stats);
    }

    // Pop clusters off the trie and keep the hash of every representative
    // read that the dissection method selects.
    let mut representatives: HashSet<u64> = HashSet::new();
    let mut number_of_clusters: u64 = 0;
    while trie.number_of_sequences() > 0 {
        let cluster = trie.pop_cluster(params.max_distance, params.use_edit)?;
        number_of_clusters += 1;
        for key in params
            .dissection_method
            .dissect(&cluster, params.max_distance, params.use_edit)
        {
            representatives.insert(key_hash(&key));
        }
    }
    info!(
        "Found {} distinct reads in {} clusters. ({:.2}s)",
        representatives.len(),
        number_of_clusters,
        timer.lap()
    );

    // Second pass: write out one record tuple per representative key.
    let mut tuples = RecordTuples::open(&params.input_files)?;
    let mut writers = params
        .output_files
        .iter()
        .map(|path| fastq::create_output(path))
        .collect::<Result<Vec<_>>>()?;
    while let Some(records) = tuples.next_tuple()? {
        let key = build_key(&records, check_slices, |record| record.seq.as_slice());
        if representatives.remove(&key_hash(&key)) {
            for (record, writer) in records.iter().zip(&mut writers) {
                seq_io::fastq::write_to(&mut *writer, &record.head, &record.seq, &record.qual)?;
            }
        }
    }
    for writer in &mut writers {
        writer.flush()?;
    }
    info!(
        "Filtered FASTQ files based on distinct reads from each cluster. ({:.2}s)",
        timer.lap()
    );
    Ok(())
}
