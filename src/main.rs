use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use log::{error, info, LevelFilter};

use fqdedup::checklen::CheckSlice;
use fqdedup::cluster::DissectionMethod;
use fqdedup::dedup::{deduplicate, DedupParams};

const DEFAULT_PREFIX: &str = "fqdedup_R";
const DEFAULT_MAX_DISTANCE: u32 = 1;
const DEFAULT_MAX_AVERAGE_ERROR_RATE: f64 = 0.001;

#[derive(Parser)]
#[command(
    name = "fqdedup",
    version,
    about = "Deduplicate FASTQ files based on UMI similarity"
)]
pub struct DedupCMD {
    #[arg(
        value_name = "FASTQ",
        required = true,
        help = "Forward FASTQ and optional reverse and UMI FASTQ files"
    )]
    pub fastq: Vec<PathBuf>,

    #[arg(
        short = 'l',
        long = "check-lengths",
        help = "Comma-separated string with the maximum string check length of each file. \
                For example 'fqdedup --check-lengths 16,8 R1.fastq R2.fastq' only checks \
                the first 16 bases of R1 and the first 8 bases of R2 for duplication. \
                Supports slice notation such as '4:8' or '::8'."
    )]
    pub check_lengths: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        help = "Output file (optional), must be specified multiple times for multiple \
                input files. For example 'fqdedup -o dedupR1.fastq -o dedupR2.fastq \
                R1.fastq R2.fastq'."
    )]
    pub output: Vec<PathBuf>,

    #[arg(
        short = 'p',
        long = "prefix",
        default_value = DEFAULT_PREFIX,
        help = "Prefix for the output files"
    )]
    pub prefix: String,

    #[arg(
        short = 'd',
        long = "max-distance",
        default_value_t = DEFAULT_MAX_DISTANCE,
        help = "The distance at which inputs are considered different"
    )]
    pub max_distance: u32,

    #[arg(
        short = 'e',
        long = "max-average-error-rate",
        default_value_t = DEFAULT_MAX_AVERAGE_ERROR_RATE,
        help = "The maximum average per base error rate for each FASTQ record. The \
                average is evaluated over bases taken into account by --check-lengths."
    )]
    pub max_average_error_rate: f64,

    #[arg(
        short = 'E',
        long = "no-average-error-rate-filter",
        help = "Do not filter on average per base error rate"
    )]
    pub no_average_error_rate_filter: bool,

    #[arg(
        long = "edit",
        help = "Use edit (Levenshtein) distance instead of Hamming distance"
    )]
    pub edit: bool,

    #[arg(
        short = 'c',
        long = "cluster-dissection-method",
        value_enum,
        default_value = "directional",
        help = "How to approach clusters with multiple reads. 'highest_count' selects \
                only one read, the one with the highest count. 'adjacency' starts from \
                the read with the highest count and selects all reads that are within \
                the specified distance, repeating the process for the remaining reads. \
                'directional' is similar to adjacency but uses counts to determine if \
                an error is a PCR/sequencing artifact or derived from a difference in \
                the molecule."
    )]
    pub cluster_dissection_method: DissectionMethod,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help = "Increase log verbosity")]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::Count, help = "Reduce log verbosity")]
    pub quiet: u8,
}

impl DedupCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let check_slices = self
            .check_lengths
            .as_deref()
            .map(CheckSlice::parse_list)
            .transpose()?;
        let output_files: Vec<PathBuf> = if self.output.is_empty() {
            (1..=self.fastq.len())
                .map(|index| PathBuf::from(format!("{}{}.fastq.gz", self.prefix, index)))
                .collect()
        } else {
            self.output.clone()
        };
        let max_average_error_rate = if self.no_average_error_rate_filter {
            1.0
        } else {
            self.max_average_error_rate
        };

        info!(
            "Input files: {}",
            self.fastq.iter().map(|path| path.display()).join(", ")
        );
        info!(
            "Output files: {}",
            output_files.iter().map(|path| path.display()).join(", ")
        );
        info!("Check lengths: {}", self.check_lengths.as_deref().unwrap_or("-"));
        info!("Maximum distance: {}", self.max_distance);
        info!("Maximum average error rate: {}", max_average_error_rate);
        info!(
            "Cluster dissection method: {:?}",
            self.cluster_dissection_method
        );

        let params = DedupParams {
            input_files: self.fastq.clone(),
            output_files,
            check_slices,
            max_distance: self.max_distance,
            max_average_error_rate,
            use_edit: self.edit,
            dissection_method: self.cluster_dissection_method,
        };
        deduplicate(&params)
    }
}

fn log_level(verbose: u8, quiet: u8) -> LevelFilter {
    // Info by default, every -v one step louder, every -q one step quieter.
    let level = 3 + verbose as i32 - quiet as i32;
    match level {
        i32::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() {
    let mut cmd = DedupCMD::parse();
    env_logger::Builder::new()
        .filter_level(log_level(cmd.verbose, cmd.quiet))
        .format_timestamp_secs()
        .init();

    let start_time = Instant::now();
    if let Err(error) = cmd.try_execute() {
        error!("{:#}", error);
        std::process::exit(1);
    }
    info!(
        "Finished. Total time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
}
