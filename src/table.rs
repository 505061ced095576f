//! Tab-separated outputs.

use crate::classify::CallDiagnostics;
use crate::compare::DiscordanceMatrix;
use crate::frequency::AlleleFrequencyRecord;
use crate::{EvalError, EvalResult};
use itertools::Itertools;
use std::fmt::Write as _;
use std::io::Write;

/// Writes discordance matrices, chunk after chunk, as one table.
///
/// The header (`ID` followed by the sample identifiers) is written with the first
/// chunk. A chunk is rendered completely before any of it reaches the writer.
pub struct DiscordanceTableWriter<W: Write> {
    inner: W,
    sample_ids: Option<Vec<String>>,
    rows_written: usize,
    // reused between chunks
    buf: String,
}

impl<W: Write> DiscordanceTableWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            sample_ids: None,
            rows_written: 0,
            buf: String::new(),
        }
    }

    /// # Errors
    /// [`EvalError::DimensionMismatch`] if the samples differ from earlier chunks.
    pub fn write_chunk(&mut self, matrix: &DiscordanceMatrix) -> EvalResult<()> {
        self.buf.clear();
        match &self.sample_ids {
            Some(ids) if ids.as_slice() != matrix.sample_ids() => {
                return Err(EvalError::DimensionMismatch(String::from(
                    "chunk samples differ from the table header",
                )));
            }
            Some(_) => {}
            None => {
                let _ = writeln!(self.buf, "ID\t{}", matrix.sample_ids().iter().join("\t"));
            }
        }

        for (id, scores) in matrix.rows() {
            let _ = writeln!(self.buf, "{id}\t{}", scores.iter().join("\t"));
        }

        self.inner.write_all(self.buf.as_bytes())?;
        if self.sample_ids.is_none() {
            self.sample_ids = Some(matrix.sample_ids().to_vec());
        }
        self.rows_written += matrix.num_variants();
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn finish(mut self) -> EvalResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// `ID  value  bin`, one line per variant.
pub fn write_frequencies(
    mut writer: impl Write,
    records: &[AlleleFrequencyRecord],
) -> EvalResult<()> {
    writeln!(writer, "ID\tfrequency\tbin")?;
    for record in records {
        writeln!(writer, "{}\t{}\t{}", record.id, record.value, record.bin)?;
    }
    writer.flush()?;
    Ok(())
}

/// `ID  heterozygous  missing_alleles  missing_rate`, one line per variant.
pub fn write_diagnostics(mut writer: impl Write, diagnostics: &[CallDiagnostics]) -> EvalResult<()> {
    writeln!(writer, "ID\theterozygous\tmissing_alleles\tmissing_rate")?;
    for d in diagnostics {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            d.id,
            d.heterozygous,
            d.missing_alleles,
            d.missing_rate()
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
fn matrix(variants: &[&str], samples: &[&str], scores: Vec<f64>) -> DiscordanceMatrix {
    DiscordanceMatrix::from_scores(
        variants.iter().map(|s| s.to_string()).collect(),
        samples.iter().map(|s| s.to_string()).collect(),
        scores,
    )
    .unwrap()
}

#[test]
fn test_table_layout_across_chunks() {
    let mut writer = DiscordanceTableWriter::new(Vec::new());
    writer
        .write_chunk(&matrix(&["rs1", "rs2"], &["HG00096", "HG00097"], vec![0.0, 0.5, 1.0, 0.0]))
        .unwrap();
    writer
        .write_chunk(&matrix(&["rs3"], &["HG00096", "HG00097"], vec![0.0, 0.0]))
        .unwrap();
    assert_eq!(writer.rows_written(), 3);

    let out = String::from_utf8(writer.finish().unwrap()).unwrap();
    assert_eq!(
        out,
        "ID\tHG00096\tHG00097\nrs1\t0\t0.5\nrs2\t1\t0\nrs3\t0\t0\n"
    );
}

#[test]
fn test_mismatched_chunk_writes_nothing() {
    let mut writer = DiscordanceTableWriter::new(Vec::new());
    writer
        .write_chunk(&matrix(&["rs1"], &["a", "b"], vec![0.0, 0.5]))
        .unwrap();
    assert!(matches!(
        writer.write_chunk(&matrix(&["rs2"], &["a"], vec![0.0])),
        Err(EvalError::DimensionMismatch(_))
    ));
    let out = String::from_utf8(writer.finish().unwrap()).unwrap();
    assert_eq!(out, "ID\ta\tb\nrs1\t0\t0.5\n");
}

#[test]
fn test_frequency_table() {
    let mut out = Vec::new();
    write_frequencies(
        &mut out,
        &[
            AlleleFrequencyRecord::new("rs1", 0.25),
            AlleleFrequencyRecord::new("rs2", 0.0),
        ],
    )
    .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID\tfrequency\tbin\nrs1\t0.25\t3\nrs2\t0\t1\n"
    );
}
