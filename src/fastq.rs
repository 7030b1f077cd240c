use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use seq_io::fastq::{OwnedRecord, Reader as FastqReader, Record};

pub type BoxedFastqReader = FastqReader<Box<dyn Read>>;

///////////////////////////////
/// Open a FASTQ file, transparently decompressing gzip input.
pub fn open_fastq(path: &Path) -> Result<BoxedFastqReader> {
    let handle = File::open(path)
        .with_context(|| format!("could not open fastq file {}", path.display()))?;
    let (reader, compression) = niffler::get_reader(Box::new(handle))
        .with_context(|| format!("could not read fastq file {}", path.display()))?;
    log::debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(FastqReader::new(reader))
}

///////////////////////////////
/// Create an output file, gzip-compressing when the path ends in .gz.
pub fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path)
        .with_context(|| format!("could not create output file {}", path.display()))?;
    let writer: Box<dyn Write> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}

/// Record id up to the first whitespace, without a trailing /1-style mate
/// marker.
fn mate_id(head: &[u8]) -> &[u8] {
    let id = head
        .split(|&c| c == b' ' || c == b'\t')
        .next()
        .unwrap_or(head);
    if id.len() >= 2 && id[id.len() - 2] == b'/' {
        &id[..id.len() - 2]
    } else {
        id
    }
}

///////////////////////////////
/// Reads several FASTQ files in lock-step, yielding one record per file at
/// a time and checking that the records belong to the same fragment.
pub struct RecordTuples {
    readers: Vec<BoxedFastqReader>,
}

impl RecordTuples {
    pub fn open(paths: &[PathBuf]) -> Result<RecordTuples> {
        let readers = paths
            .iter()
            .map(|path| open_fastq(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordTuples { readers })
    }

    pub fn next_tuple(&mut self) -> Result<Option<Vec<OwnedRecord>>> {
        let mut records = Vec::with_capacity(self.readers.len());
        let mut finished = 0;
        for reader in &mut self.readers {
            match reader.next() {
                Some(record) => records.push(Some(record?.to_owned_record())),
                None => {
                    records.push(None);
                    finished += 1;
                }
            }
        }
        if finished == records.len() {
            return Ok(None);
        }
        if finished > 0 {
            bail!("FASTQ files are not in sync: not all files ended at the same record");
        }
        let records: Vec<OwnedRecord> = records.into_iter().flatten().collect();
        let first_id = mate_id(records[0].head());
        for record in &records[1..] {
            if mate_id(record.head()) != first_id {
                bail!(
                    "FASTQ files are not in sync: {} is not a mate of {}",
                    String::from_utf8_lossy(record.head()),
                    String::from_utf8_lossy(records[0].head()),
                );
            }
        }
        Ok(Some(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &'static str) -> BoxedFastqReader {
        FastqReader::new(Box::new(Cursor::new(data.as_bytes())))
    }

    #[test]
    fn test_mate_id() {
        assert_eq!(mate_id(b"read1/1"), b"read1");
        assert_eq!(mate_id(b"read1/2 extra comment"), b"read1");
        assert_eq!(mate_id(b"read1 comment"), b"read1");
        assert_eq!(mate_id(b"read1"), b"read1");
    }

    #[test]
    fn test_record_tuples_in_sync() {
        let mut tuples = RecordTuples {
            readers: vec![
                reader("@r1/1\nACGT\n+\nIIII\n@r2/1\nTTTT\n+\nIIII\n"),
                reader("@r1/2\nGGGG\n+\nIIII\n@r2/2\nCCCC\n+\nIIII\n"),
            ],
        };
        let records = tuples.next_tuple().unwrap().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, b"ACGT");
        assert_eq!(records[1].seq, b"GGGG");
        let records = tuples.next_tuple().unwrap().unwrap();
        assert_eq!(records[0].seq, b"TTTT");
        assert!(tuples.next_tuple().unwrap().is_none());
    }

    #[test]
    fn test_record_tuples_out_of_sync() {
        let mut tuples = RecordTuples {
            readers: vec![
                reader("@r1/1\nACGT\n+\nIIII\n"),
                reader("@r9/2\nGGGG\n+\nIIII\n"),
            ],
        };
        assert!(tuples.next_tuple().is_err());
    }

    #[test]
    fn test_record_tuples_unequal_lengths() {
        let mut tuples = RecordTuples {
            readers: vec![
                reader("@r1/1\nACGT\n+\nIIII\n@r2/1\nTTTT\n+\nIIII\n"),
                reader("@r1/2\nGGGG\n+\nIIII\n"),
            ],
        };
        tuples.next_tuple().unwrap();
        assert!(tuples.next_tuple().is_err());
    }
}
