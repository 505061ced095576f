//! Chunked truth-versus-candidate evaluation.
//!
//! Both variant streams are consumed in lockstep, `chunk_size` variants at a
//! time. Each chunk is turned into a pair of [`GenotypeArray`]s, compared, summarized,
//! and appended to the discordance table. A chunk that fails validation is
//! dropped whole: the error is returned and none of its rows are written.

use crate::aggregate::{summarize, DiscordanceSummary};
use crate::compare::{compare, DiscordanceMatrix};
use crate::config::EvaluationConfig;
use crate::table::DiscordanceTableWriter;
use crate::{EvalError, EvalResult, GenotypeArray, VariantRecord};
use itertools::{EitherOrBoth, Itertools};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, info};

/// Outcome of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub index: usize,
    pub first_variant: String,
    pub num_variants: usize,
    pub summary: DiscordanceSummary,
}

/// Compares two datasets chunk by chunk.
pub struct Evaluator<'c> {
    config: &'c EvaluationConfig,
    truth_samples: Vec<String>,
    candidate_samples: Vec<String>,
}

impl<'c> Evaluator<'c> {
    pub fn new(
        config: &'c EvaluationConfig,
        truth_samples: Vec<String>,
        candidate_samples: Vec<String>,
    ) -> Self {
        Self {
            config,
            truth_samples,
            candidate_samples,
        }
    }

    /// Evaluate the two streams, writing the table to `out`.
    ///
    /// Reports are returned per chunk; combining them is left to the caller.
    pub fn run<T, C, W>(&self, truth: T, candidate: C, out: W) -> EvalResult<Vec<ChunkReport>>
    where
        T: IntoIterator<Item = EvalResult<VariantRecord>>,
        C: IntoIterator<Item = EvalResult<VariantRecord>>,
        W: Write,
    {
        self.run_with(truth, candidate, out, |_| Ok(()))
    }

    /// Like [`Evaluator::run`], handing every chunk's matrix to `on_chunk` before
    /// it is written. An error from `on_chunk` fails that chunk.
    pub fn run_with<T, C, W, F>(
        &self,
        truth: T,
        candidate: C,
        out: W,
        mut on_chunk: F,
    ) -> EvalResult<Vec<ChunkReport>>
    where
        T: IntoIterator<Item = EvalResult<VariantRecord>>,
        C: IntoIterator<Item = EvalResult<VariantRecord>>,
        W: Write,
        F: FnMut(&DiscordanceMatrix) -> EvalResult<()>,
    {
        let mut writer = DiscordanceTableWriter::new(out);
        let mut reports = Vec::new();

        let chunks = truth
            .into_iter()
            .zip_longest(candidate)
            .chunks(self.config.chunk_size());

        for (index, chunk) in (&chunks).into_iter().enumerate() {
            let (matrix, summary) = self.evaluate_chunk(index, chunk)?;
            on_chunk(&matrix)?;
            writer.write_chunk(&matrix)?;

            info!(
                label = self.config.label(),
                chunk = index,
                variants = matrix.num_variants(),
                mean = summary.mean,
                rmse = summary.rmse,
                "chunk evaluated"
            );
            reports.push(ChunkReport {
                index,
                first_variant: matrix.variant_ids().first().cloned().unwrap_or_default(),
                num_variants: matrix.num_variants(),
                summary,
            });
        }

        writer.finish()?;
        Ok(reports)
    }

    /// Evaluate the two streams into the table file named by the configuration.
    ///
    /// The file is removed again if evaluation fails before any chunk is written.
    pub fn run_to_file<T, C>(&self, truth: T, candidate: C) -> EvalResult<Vec<ChunkReport>>
    where
        T: IntoIterator<Item = EvalResult<VariantRecord>>,
        C: IntoIterator<Item = EvalResult<VariantRecord>>,
    {
        self.run_to_file_with(truth, candidate, |_| Ok(()))
    }

    /// [`Evaluator::run_with`] into the table file named by the configuration.
    pub fn run_to_file_with<T, C, F>(
        &self,
        truth: T,
        candidate: C,
        on_chunk: F,
    ) -> EvalResult<Vec<ChunkReport>>
    where
        T: IntoIterator<Item = EvalResult<VariantRecord>>,
        C: IntoIterator<Item = EvalResult<VariantRecord>>,
        F: FnMut(&DiscordanceMatrix) -> EvalResult<()>,
    {
        let path = self.config.table_path();
        let file = BufWriter::new(File::create(&path)?);
        let result = self.run_with(truth, candidate, file, on_chunk);
        match &result {
            Ok(reports) => info!(path = %path.display(), chunks = reports.len(), "wrote discordance table"),
            Err(_) => {
                let written = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                if written == 0 {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
        result
    }

    fn evaluate_chunk(
        &self,
        index: usize,
        chunk: impl Iterator<Item = EitherOrBoth<EvalResult<VariantRecord>, EvalResult<VariantRecord>>>,
    ) -> EvalResult<(DiscordanceMatrix, DiscordanceSummary)> {
        let mut truth = GenotypeArray::builder(self.truth_samples.iter().cloned());
        let mut candidate = GenotypeArray::builder(self.candidate_samples.iter().cloned());

        for pair in chunk {
            match pair {
                EitherOrBoth::Both(t, c) => {
                    truth.add_record(&t?)?;
                    candidate.add_record(&c?)?;
                }
                EitherOrBoth::Left(_) => {
                    return Err(EvalError::DimensionMismatch(format!(
                        "candidate ended before truth in chunk {index}"
                    )))
                }
                EitherOrBoth::Right(_) => {
                    return Err(EvalError::DimensionMismatch(format!(
                        "truth ended before candidate in chunk {index}"
                    )))
                }
            }
        }

        let (truth, candidate) = (truth.build(), candidate.build());
        debug!(
            chunk = index,
            variants = truth.num_variants(),
            samples = truth.num_samples(),
            "comparing chunk"
        );
        let matrix = compare(&truth, &candidate)?;
        let summary = summarize(&matrix)?;
        Ok((matrix, summary))
    }
}

/// Compare several candidate datasets against one truth, writing one table per
/// label into the configured output directory.
pub fn compare_datasets(
    config: &EvaluationConfig,
    truth: &GenotypeArray,
    candidates: &[(String, GenotypeArray)],
) -> EvalResult<Vec<(String, DiscordanceSummary)>> {
    let mut summaries = Vec::with_capacity(candidates.len());
    for (label, candidate) in candidates {
        let config = config.relabel(label.as_str())?;
        info!(label = %label, "computing discordance");

        let matrix = compare(truth, candidate)?;
        let summary = summarize(&matrix)?;

        let path = config.table_path();
        let mut writer = DiscordanceTableWriter::new(BufWriter::new(File::create(&path)?));
        writer.write_chunk(&matrix)?;
        writer.finish()?;
        debug!(path = %path.display(), "wrote discordance table");

        summaries.push((label.clone(), summary));
    }
    Ok(summaries)
}

#[cfg(test)]
use crate::RawCall;

#[cfg(test)]
fn records(rows: &[(&str, &[[i32; 2]])]) -> Vec<EvalResult<VariantRecord>> {
    rows.iter()
        .map(|(id, calls)| {
            Ok(VariantRecord {
                chrom: String::from("20"),
                id: Some(id.to_string()),
                calls: calls.iter().copied().map(RawCall::from).collect(),
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
fn samples() -> Vec<String> {
    vec![String::from("HG00096"), String::from("HG00097")]
}

#[test]
fn test_run_identical_streams() {
    let config = EvaluationConfig::new("identity", 2).unwrap();
    let rows: &[(&str, &[[i32; 2]])] = &[
        ("rs1", &[[0, 0], [0, 1]]),
        ("rs2", &[[1, 1], [-1, -1]]),
        ("rs3", &[[1, 0], [0, 0]]),
    ];
    let mut out = Vec::new();
    let reports = Evaluator::new(&config, samples(), samples())
        .run(records(rows), records(rows), &mut out)
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].num_variants, 2);
    assert_eq!(reports[1].first_variant, "rs3");
    assert!(reports.iter().all(|r| r.summary.mean == 0.0 && r.summary.rmse == 0.0));
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID\tHG00096\tHG00097\nrs1\t0\t0\nrs2\t0\t0\nrs3\t0\t0\n"
    );
}

#[test]
fn test_failed_chunk_writes_nothing() {
    let config = EvaluationConfig::new("pooled", 2).unwrap();
    let truth: &[(&str, &[[i32; 2]])] = &[
        ("rs1", &[[0, 0], [0, 1]]),
        ("rs2", &[[1, 1], [0, 0]]),
        ("rs3", &[[1, 0], [0, 0]]),
        ("rs4", &[[1, 0], [0, 0]]),
    ];
    let candidate: &[(&str, &[[i32; 2]])] = &[
        ("rs1", &[[1, 1], [0, 1]]),
        ("rs2", &[[1, 1], [0, 0]]),
        ("rs3", &[[1, 0]]),
        ("rs4", &[[1, 0], [0, 0]]),
    ];
    let mut out = Vec::new();
    let err = Evaluator::new(&config, samples(), samples())
        .run(records(truth), records(candidate), &mut out)
        .unwrap_err();
    assert!(matches!(err, EvalError::DimensionMismatch(_)));

    // only the first, valid chunk made it out
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID\tHG00096\tHG00097\nrs1\t1\t0\nrs2\t0\t0\n"
    );
}

#[test]
fn test_streams_of_unequal_length() {
    let config = EvaluationConfig::new("pooled", 10).unwrap();
    let truth: &[(&str, &[[i32; 2]])] = &[("rs1", &[[0, 0], [0, 1]]), ("rs2", &[[0, 0], [0, 0]])];
    let mut out = Vec::new();
    let err = Evaluator::new(&config, samples(), samples())
        .run(records(truth), records(&truth[..1]), &mut out)
        .unwrap_err();
    assert!(matches!(err, EvalError::DimensionMismatch(_)));
    assert!(out.is_empty());
}

#[test]
fn test_population_totals_fold_across_chunks() {
    use crate::population::{summarize_populations, PopulationAccumulator, PopulationMap};

    let config = EvaluationConfig::new("pooled", 1).unwrap();
    let truth: &[(&str, &[[i32; 2]])] = &[
        ("rs1", &[[0, 0], [0, 1]]),
        ("rs2", &[[1, 1], [0, 0]]),
        ("rs3", &[[-1, -1], [0, 0]]),
    ];
    let candidate: &[(&str, &[[i32; 2]])] = &[
        ("rs1", &[[0, 1], [0, 1]]),
        ("rs2", &[[1, 1], [1, 1]]),
        ("rs3", &[[0, 0], [0, 0]]),
    ];
    let map = [
        (String::from("HG00096"), String::from("GBR")),
        (String::from("HG00097"), String::from("FIN")),
    ]
    .into_iter()
    .collect::<PopulationMap>();

    let mut by_population = PopulationAccumulator::default();
    let mut chunks_seen = 0;
    let reports = Evaluator::new(&config, samples(), samples())
        .run_with(records(truth), records(candidate), std::io::sink(), |matrix| {
            chunks_seen += 1;
            by_population.add_matrix(matrix, &map)
        })
        .unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(chunks_seen, 3);

    let whole = crate::compare::compare(
        &GenotypeArray::from_records(samples(), &collect_records(truth)).unwrap(),
        &GenotypeArray::from_records(samples(), &collect_records(candidate)).unwrap(),
    )
    .unwrap();
    let folded = by_population.finish();
    assert_eq!(folded, summarize_populations(&whole, &map).unwrap());
    assert_eq!(folded[0].population, "GBR");
    assert!((folded[0].mean - 1.5 / 3.0).abs() < 1e-12);
    assert!((folded[1].mean - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_failing_chunk_hook_stops_output() {
    let config = EvaluationConfig::new("pooled", 1).unwrap();
    let rows: &[(&str, &[[i32; 2]])] = &[("rs1", &[[0, 0], [0, 1]]), ("rs2", &[[1, 1], [0, 0]])];
    let mut out = Vec::new();
    let err = Evaluator::new(&config, samples(), samples())
        .run_with(records(rows), records(rows), &mut out, |matrix| {
            if matrix.variant_ids()[0] == "rs2" {
                Err(EvalError::Configuration(String::from("stop")))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
    assert!(matches!(err, EvalError::Configuration(_)));
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID\tHG00096\tHG00097\nrs1\t0\t0\n"
    );
}

#[cfg(test)]
fn collect_records(rows: &[(&str, &[[i32; 2]])]) -> Vec<VariantRecord> {
    records(rows).into_iter().map(Result::unwrap).collect()
}

#[test]
fn test_compare_datasets_writes_one_table_per_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = EvaluationConfig::new("unused", 1000)
        .unwrap()
        .sorted(true)
        .with_output_dir(dir.path());

    let truth = GenotypeArray::from_tabular(vec![(
        String::from("rs1"),
        vec![RawCall::unphased(0, 0), RawCall::unphased(1, 1)],
    )])
    .unwrap();
    let pooled = GenotypeArray::from_tabular(vec![(
        String::from("rs1"),
        vec![RawCall::unphased(1, 1), RawCall::unphased(1, 1)],
    )])
    .unwrap();

    let summaries = compare_datasets(
        &config,
        &truth,
        &[
            (String::from("pooled"), pooled),
            (String::from("missing"), truth.clone()),
        ],
    )
    .unwrap();

    assert_eq!(summaries[0].0, "pooled");
    assert_eq!(summaries[0].1.mean, 0.5);
    assert_eq!(summaries[1].1.mean, 0.0);
    let table = std::fs::read_to_string(dir.path().join("pooled.sorted.chunk1000.csv")).unwrap();
    assert_eq!(table, "ID\ts0\ts1\nrs1\t1\t0\n");
    assert!(dir.path().join("missing.sorted.chunk1000.csv").exists());
}
