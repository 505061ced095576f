use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use poolsnps::adapter::vcf::{read_genotype_array, VariantStream};
use poolsnps::classify::diagnose;
use poolsnps::config::{EvaluationConfig, DEFAULT_CHUNK_SIZE};
use poolsnps::frequency::{DatasetSource, ExternalFrequencyTool, FrequencyStrategy};
use poolsnps::likelihood::{
    LikelihoodEncoderConfig, LikelihoodScale, LikelihoodVector, LikelihoodWriter,
};
use poolsnps::pipeline::Evaluator;
use poolsnps::population::{PopulationAccumulator, PopulationMap};
use poolsnps::table::{write_diagnostics, write_frequencies};
use std::ffi::OsString;
use std::fs::File;
use std::io::{stdout, BufReader, BufWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "poolsnps", about = "Evaluate pooled genotype decoding against a truth set")]
struct Cli {
    /// Increase logging verbosity (-v: debug, -vv: trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-call discordance between a truth and a candidate file, in chunks.
    Discordance {
        #[arg(long)]
        truth: PathBuf,
        #[arg(long)]
        candidate: PathBuf,
        /// Dataset label, used in the table name.
        #[arg(long, default_value = "candidate")]
        label: String,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Inputs are position-sorted.
        #[arg(long)]
        sorted: bool,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// `sample<TAB>population` table; prints a per-population summary.
        #[arg(long)]
        populations: Option<PathBuf>,
    },
    /// ALT allele frequency and frequency bin per variant.
    Frequencies {
        #[arg(long)]
        vcf: PathBuf,
        #[arg(long, value_enum, default_value_t = Strategy::Direct)]
        strategy: Strategy,
        /// INFO key read by the `info` strategy.
        #[arg(long, default_value = "AF")]
        info_key: String,
        /// Program run by the `external` strategy.
        #[arg(long, default_value = "bcftools")]
        tool: OsString,
    },
    /// Heterozygous and missing-allele counts per variant.
    Diagnostics {
        #[arg(long)]
        vcf: PathBuf,
    },
    /// Rewrite hard calls as genotype likelihoods.
    EncodeGl {
        #[arg(long)]
        vcf: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Write log10 likelihoods, floored at -5.
        #[arg(long)]
        log10: bool,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Strategy {
    Direct,
    Info,
    External,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Discordance {
            truth,
            candidate,
            label,
            chunk_size,
            sorted,
            out_dir,
            populations,
        } => {
            let config = EvaluationConfig::new(label, chunk_size)?
                .sorted(sorted)
                .with_output_dir(out_dir);
            run_discordance(&config, truth, candidate, populations)
        }
        Commands::Frequencies {
            vcf,
            strategy,
            info_key,
            tool,
        } => run_frequencies(vcf, strategy, info_key, tool),
        Commands::Diagnostics { vcf } => run_diagnostics(vcf),
        Commands::EncodeGl {
            vcf,
            output,
            log10,
        } => run_encode_gl(vcf, output, log10),
    }
}

fn run_discordance(
    config: &EvaluationConfig,
    truth_path: PathBuf,
    candidate_path: PathBuf,
    populations: Option<PathBuf>,
) -> Result<()> {
    let map = match populations {
        Some(path) => {
            let map = PopulationMap::from_reader(BufReader::new(File::open(&path).with_context(
                || format!("failed to open population table {}", path.display()),
            )?))?;
            info!(samples = map.len(), "loaded population table");
            Some(map)
        }
        None => None,
    };

    let truth = VariantStream::open(&truth_path)
        .with_context(|| format!("failed to open truth file {}", truth_path.display()))?;
    let candidate = VariantStream::open(&candidate_path)
        .with_context(|| format!("failed to open candidate file {}", candidate_path.display()))?;

    let evaluator = Evaluator::new(config, truth.sample_ids(), candidate.sample_ids());
    let mut by_population = PopulationAccumulator::default();
    let reports = evaluator
        .run_to_file_with(truth, candidate, |matrix| match &map {
            Some(map) => by_population.add_matrix(matrix, map),
            None => Ok(()),
        })
        .with_context(|| format!("discordance evaluation of {} failed", config.label()))?;

    for report in &reports {
        println!(
            "chunk {}\tfirst={}\tvariants={}\tmean={}\trmse={}\tlog1p_mse={}",
            report.index,
            report.first_variant,
            report.num_variants,
            report.summary.mean,
            report.summary.rmse,
            report.summary.log1p_mse
        );
    }

    if map.is_some() {
        for summary in by_population.finish() {
            println!(
                "{}\tsamples={}\tmean={}\trmse={}",
                summary.population, summary.num_samples, summary.mean, summary.rmse
            );
        }
    }
    Ok(())
}

fn run_frequencies(vcf: PathBuf, strategy: Strategy, info_key: String, tool: OsString) -> Result<()> {
    let strategy = match strategy {
        Strategy::Direct => FrequencyStrategy::Direct,
        Strategy::Info => FrequencyStrategy::InfoField { key: info_key },
        Strategy::External => FrequencyStrategy::ExternalTool(ExternalFrequencyTool {
            program: tool,
            ..Default::default()
        }),
    };
    let records = strategy
        .estimate(&DatasetSource::Path(vcf.clone()))
        .with_context(|| format!("failed to estimate frequencies for {}", vcf.display()))?;

    if records.is_empty() {
        bail!("{} has no variants", vcf.display());
    }
    write_frequencies(BufWriter::new(stdout().lock()), &records)?;
    Ok(())
}

fn run_diagnostics(vcf: PathBuf) -> Result<()> {
    let array = read_genotype_array(&vcf)
        .with_context(|| format!("failed to load genotypes from {}", vcf.display()))?;
    info!(
        variants = array.num_variants(),
        samples = array.num_samples(),
        "loaded genotypes"
    );
    write_diagnostics(BufWriter::new(stdout().lock()), &diagnose(&array))?;
    Ok(())
}

fn run_encode_gl(vcf: PathBuf, output: PathBuf, log10: bool) -> Result<()> {
    let stream = VariantStream::open(&vcf)
        .with_context(|| format!("failed to open {}", vcf.display()))?;
    let header = stream.header_lines()?;

    let scale = if log10 {
        LikelihoodScale::Log10
    } else {
        LikelihoodScale::Linear
    };
    let config = LikelihoodEncoderConfig::new(scale, LikelihoodVector::UNIFORM)?;
    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = LikelihoodWriter::new(BufWriter::new(file), config);
    writer.write_header(header.iter().map(String::as_str))?;

    let mut written = 0usize;
    for record in stream {
        let record = record?;
        writer
            .write_record(&record)
            .with_context(|| format!("failed to encode variant {}", record.key()))?;
        written += 1;
    }
    writer.flush()?;
    info!(records = written, path = %output.display(), "wrote likelihoods");
    Ok(())
}
