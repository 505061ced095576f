//! Alternate allele frequencies and their frequency bins.
//!
//! Frequencies come from a [`FrequencySource`]. The primary source,
//! [`DirectFrequency`], weighs the calls of a [`GenotypeArray`]. When calls are
//! not available the value is taken from a precomputed annotation instead, either
//! an INFO field ([`InfoFieldFrequency`]) or the output of an external tool
//! ([`ExternalToolFrequency`]). Which one runs is chosen up front through
//! [`FrequencyStrategy`].

use crate::classify::minor_allele_weight;
use crate::{EvalError, EvalResult, GenotypeArray, VariantRecord};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Left edges of the frequency bins.
pub const FREQUENCY_BINS: [f64; 3] = [0.00, 0.01, 0.05];

/// Index of the bin `value` falls in, counting bin edges at or below it.
///
/// Values below the first edge land in bin 0; a value sitting exactly on an edge
/// belongs to the bin that edge opens.
pub fn frequency_bin(value: f64) -> usize {
    FREQUENCY_BINS.iter().filter(|&&edge| edge <= value).count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlleleFrequencyRecord {
    pub id: String,
    pub value: f64,
    pub bin: usize,
}

impl AlleleFrequencyRecord {
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            bin: frequency_bin(value),
        }
    }
}

/// Anything able to produce one frequency per variant.
pub trait FrequencySource {
    fn allele_frequencies(&self) -> EvalResult<Vec<AlleleFrequencyRecord>>;
}

/// Frequencies computed from the calls themselves.
pub struct DirectFrequency<'a>(pub &'a GenotypeArray);

impl FrequencySource for DirectFrequency<'_> {
    fn allele_frequencies(&self) -> EvalResult<Vec<AlleleFrequencyRecord>> {
        let array = self.0;
        if array.num_samples() == 0 {
            return Err(EvalError::Configuration(String::from(
                "cannot compute allele frequencies without samples",
            )));
        }
        let total_alleles = (2 * array.num_samples()) as f64;

        Ok(array
            .iter()
            .map(|row| {
                let alt: usize = row
                    .calls()
                    .iter()
                    .map(|&call| minor_allele_weight(call) as usize)
                    .sum();
                AlleleFrequencyRecord::new(row.id(), alt as f64 / total_alleles)
            })
            .collect())
    }
}

/// Frequencies read from an INFO annotation of each record, `AF` by default.
pub struct InfoFieldFrequency<'a> {
    pub records: &'a [VariantRecord],
    pub key: String,
}

impl<'a> InfoFieldFrequency<'a> {
    pub fn new(records: &'a [VariantRecord]) -> Self {
        Self {
            records,
            key: String::from("AF"),
        }
    }

    pub fn with_key(self, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..self
        }
    }
}

impl FrequencySource for InfoFieldFrequency<'_> {
    fn allele_frequencies(&self) -> EvalResult<Vec<AlleleFrequencyRecord>> {
        self.records
            .iter()
            .map(|record| {
                let id = record.key();
                let Some(raw) = record.info_value(&self.key) else {
                    warn!(variant = %id, key = %self.key, "record has no frequency annotation");
                    return Err(EvalError::malformed(
                        id,
                        format!("INFO has no {} value", self.key),
                    ));
                };
                let value = parse_frequency(raw)
                    .ok_or_else(|| EvalError::malformed(&id, format!("bad {} value {raw:?}", self.key)))?;
                Ok(AlleleFrequencyRecord::new(id, value))
            })
            .collect()
    }
}

/// First value of a possibly comma-separated frequency, if it lies in `[0, 1]`.
fn parse_frequency(raw: &str) -> Option<f64> {
    let first = raw.split(',').next()?.trim();
    let value = first.parse::<f64>().ok()?;
    (0.0..=1.0).contains(&value).then_some(value)
}

const TABLE_PREFIX: &str = "poolsnps-freq-";

/// Command used to tabulate `id<TAB>frequency` from a variant file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFrequencyTool {
    pub program: OsString,
    pub query_format: String,
    /// Directory for the temporary table; the system default when `None`.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExternalFrequencyTool {
    fn default() -> Self {
        Self {
            program: OsString::from("bcftools"),
            query_format: String::from("%ID\t%AF\n"),
            temp_dir: None,
        }
    }
}

impl ExternalFrequencyTool {
    /// Run the tool once on `vcf`.
    ///
    /// The tool writes into a temporary file private to this call, which is
    /// removed whether the run succeeds or not.
    pub fn run(&self, vcf: &Path) -> EvalResult<Vec<AlleleFrequencyRecord>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TABLE_PREFIX).suffix(".tsv");
        let table = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        debug!(
            program = ?self.program,
            input = %vcf.display(),
            table = %table.path().display(),
            "running external frequency tool"
        );

        let output = Command::new(&self.program)
            .arg("query")
            .arg("-f")
            .arg(&self.query_format)
            .arg(vcf)
            .stdin(Stdio::null())
            .stdout(Stdio::from(table.reopen()?))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                EvalError::ExternalTool(format!("couldn't start {:?}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, "external frequency tool failed");
            return Err(EvalError::ExternalTool(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_frequency_table(BufReader::new(File::open(table.path())?))
    }
}

/// Parse `id<TAB>frequency` lines, returning the records sorted by identifier.
pub fn parse_frequency_table(reader: impl BufRead) -> EvalResult<Vec<AlleleFrequencyRecord>> {
    let mut records = Vec::new();
    for (line_i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (id, raw) = line.split_once('\t').ok_or_else(|| {
            EvalError::ExternalTool(format!("line {}: expected two tab-separated columns", line_i + 1))
        })?;
        let value = parse_frequency(raw).ok_or_else(|| {
            EvalError::ExternalTool(format!("line {}: bad frequency {raw:?} for {id}", line_i + 1))
        })?;
        records.push(AlleleFrequencyRecord::new(id, value));
    }
    records.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(records)
}

/// Frequencies tabulated by an external tool from a file on disk.
pub struct ExternalToolFrequency<'a> {
    pub tool: &'a ExternalFrequencyTool,
    pub vcf: &'a Path,
}

impl FrequencySource for ExternalToolFrequency<'_> {
    fn allele_frequencies(&self) -> EvalResult<Vec<AlleleFrequencyRecord>> {
        self.tool.run(self.vcf)
    }
}

/// Where a dataset lives: already loaded, or still on disk.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Array(GenotypeArray),
    Path(PathBuf),
}

impl DatasetSource {
    /// Accept exactly one of a loaded array or a path.
    pub fn new(array: Option<GenotypeArray>, path: Option<PathBuf>) -> EvalResult<Self> {
        match (array, path) {
            (Some(array), None) => Ok(Self::Array(array)),
            (None, Some(path)) => Ok(Self::Path(path)),
            (Some(_), Some(_)) => Err(EvalError::Configuration(String::from(
                "both a genotype array and a source path were given",
            ))),
            (None, None) => Err(EvalError::Configuration(String::from(
                "neither a genotype array nor a source path was given",
            ))),
        }
    }
}

/// How frequencies are obtained for a [`DatasetSource`].
#[derive(Debug, Clone, Default)]
pub enum FrequencyStrategy {
    /// Weigh the calls. A path-backed source is loaded first, which needs the
    /// `noodles` feature.
    #[default]
    Direct,
    /// Ask an external tool, only for path-backed sources.
    ExternalTool(ExternalFrequencyTool),
    /// Read a precomputed INFO annotation, only for path-backed sources.
    InfoField { key: String },
}

impl FrequencyStrategy {
    pub fn estimate(&self, source: &DatasetSource) -> EvalResult<Vec<AlleleFrequencyRecord>> {
        match (self, source) {
            (FrequencyStrategy::Direct, DatasetSource::Array(array)) => {
                DirectFrequency(array).allele_frequencies()
            }
            (FrequencyStrategy::Direct, DatasetSource::Path(path)) => load_and_weigh(path),
            (FrequencyStrategy::ExternalTool(tool), DatasetSource::Path(vcf)) => {
                ExternalToolFrequency { tool, vcf }.allele_frequencies()
            }
            (FrequencyStrategy::ExternalTool(_), DatasetSource::Array(_)) => {
                Err(EvalError::Configuration(String::from(
                    "the external frequency tool needs a file, not an in-memory array",
                )))
            }
            (FrequencyStrategy::InfoField { key }, DatasetSource::Path(path)) => {
                load_and_read_info(path, key)
            }
            (FrequencyStrategy::InfoField { .. }, DatasetSource::Array(_)) => {
                Err(EvalError::Configuration(String::from(
                    "an in-memory array carries no INFO annotations",
                )))
            }
        }
    }
}

#[cfg(feature = "noodles")]
fn load_and_weigh(path: &Path) -> EvalResult<Vec<AlleleFrequencyRecord>> {
    let array = crate::adapter::vcf::read_genotype_array(path)?;
    DirectFrequency(&array).allele_frequencies()
}

#[cfg(feature = "noodles")]
fn load_and_read_info(path: &Path, key: &str) -> EvalResult<Vec<AlleleFrequencyRecord>> {
    let records = crate::adapter::vcf::VariantStream::open(path)?.collect::<EvalResult<Vec<_>>>()?;
    InfoFieldFrequency::new(&records)
        .with_key(key)
        .allele_frequencies()
}

#[cfg(not(feature = "noodles"))]
fn without_reader(path: &Path) -> EvalError {
    EvalError::Configuration(format!(
        "cannot load {} without the noodles feature",
        path.display()
    ))
}

#[cfg(not(feature = "noodles"))]
fn load_and_weigh(path: &Path) -> EvalResult<Vec<AlleleFrequencyRecord>> {
    Err(without_reader(path))
}

#[cfg(not(feature = "noodles"))]
fn load_and_read_info(path: &Path, _key: &str) -> EvalResult<Vec<AlleleFrequencyRecord>> {
    Err(without_reader(path))
}

#[cfg(test)]
use crate::RawCall;

#[test]
fn test_bins_are_left_inclusive() {
    assert_eq!(frequency_bin(-0.5), 0);
    assert_eq!(frequency_bin(0.0), 1);
    assert_eq!(frequency_bin(0.005), 1);
    assert_eq!(frequency_bin(0.01), 2);
    assert_eq!(frequency_bin(0.049), 2);
    assert_eq!(frequency_bin(0.05), 3);
    assert_eq!(frequency_bin(1.0), 3);
}

#[test]
fn test_direct_frequency() {
    let array = GenotypeArray::from_tabular(vec![
        (
            String::from("rs1"),
            vec![
                RawCall::unphased(0, 1),
                RawCall::unphased(1, 1),
                RawCall::MISSING,
                RawCall::unphased(0, 0),
            ],
        ),
        (String::from("rs2"), vec![RawCall::unphased(0, 0); 4]),
    ])
    .unwrap();

    let freqs = DirectFrequency(&array).allele_frequencies().unwrap();
    assert_eq!(freqs.len(), 2);
    assert_eq!(freqs[0].id, "rs1");
    assert!((freqs[0].value - 3.0 / 8.0).abs() < 1e-12);
    assert_eq!(freqs[0].bin, 3);
    assert_eq!(freqs[1].value, 0.0);
    assert_eq!(freqs[1].bin, 1);
}

#[test]
fn test_direct_frequency_without_samples() {
    let array = GenotypeArray::builder(Vec::<String>::new()).build();
    assert!(matches!(
        DirectFrequency(&array).allele_frequencies(),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_info_field_frequency() {
    use crate::parse_info_field;

    let records = vec![
        VariantRecord {
            id: Some(String::from("rs1")),
            info: parse_info_field("AC=2;AF=0.0399,0.1"),
            ..Default::default()
        },
        VariantRecord {
            id: Some(String::from("rs2")),
            info: parse_info_field("AC=1;AF=0.004"),
            ..Default::default()
        },
    ];

    let freqs = InfoFieldFrequency::new(&records).allele_frequencies().unwrap();
    assert_eq!(freqs[0], AlleleFrequencyRecord::new("rs1", 0.0399));
    assert_eq!(freqs[0].bin, 2);
    assert_eq!(freqs[1].bin, 1);

    let missing = InfoFieldFrequency::new(&records).with_key("MAF");
    assert!(matches!(
        missing.allele_frequencies(),
        Err(EvalError::MalformedRecord { .. })
    ));
}

#[test]
fn test_parse_frequency_table_sorts_by_id() {
    let table = "rs9\t0.2\nrs10\t0.001\n\nrs1\t0.03\n";
    let freqs = parse_frequency_table(table.as_bytes()).unwrap();
    let ids = freqs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["rs1", "rs10", "rs9"]);
    assert_eq!(freqs.iter().map(|r| r.bin).collect::<Vec<_>>(), [2, 1, 3]);
}

#[test]
fn test_parse_frequency_table_rejects_missing_values() {
    assert!(matches!(
        parse_frequency_table("rs1\t.\n".as_bytes()),
        Err(EvalError::ExternalTool(_))
    ));
    assert!(matches!(
        parse_frequency_table("rs1 0.2\n".as_bytes()),
        Err(EvalError::ExternalTool(_))
    ));
    assert!(matches!(
        parse_frequency_table("rs1\t1.5\n".as_bytes()),
        Err(EvalError::ExternalTool(_))
    ));
}

#[test]
fn test_dataset_source_requires_exactly_one_input() {
    let array = GenotypeArray::builder(["s0"]).build();
    assert!(matches!(
        DatasetSource::new(Some(array.clone()), Some(PathBuf::from("x.vcf"))),
        Err(EvalError::Configuration(_))
    ));
    assert!(matches!(
        DatasetSource::new(None, None),
        Err(EvalError::Configuration(_))
    ));
    assert!(matches!(
        DatasetSource::new(Some(array), None),
        Ok(DatasetSource::Array(_))
    ));
}

#[test]
fn test_strategy_rejects_external_tool_on_array() {
    let source = DatasetSource::Array(GenotypeArray::builder(["s0"]).build());
    let strategy = FrequencyStrategy::ExternalTool(ExternalFrequencyTool::default());
    assert!(matches!(
        strategy.estimate(&source),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_strategy_rejects_info_field_on_array() {
    let source = DatasetSource::Array(GenotypeArray::builder(["s0"]).build());
    let strategy = FrequencyStrategy::InfoField {
        key: String::from("AF"),
    };
    assert!(matches!(
        strategy.estimate(&source),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_missing_external_program() {
    let tool = ExternalFrequencyTool {
        program: OsString::from("poolsnps-no-such-frequency-tool"),
        ..Default::default()
    };
    assert!(matches!(
        tool.run(Path::new("missing.vcf")),
        Err(EvalError::ExternalTool(_))
    ));
}

#[cfg(all(test, unix))]
fn leftover_tables(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(TABLE_PREFIX))
        })
        .collect()
}

#[cfg(unix)]
#[test]
fn test_external_tool_success_removes_table() {
    let dir = tempfile::tempdir().unwrap();
    let tool = ExternalFrequencyTool {
        program: OsString::from("true"),
        temp_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    // `true` ignores its arguments and writes nothing
    let freqs = tool.run(Path::new("input.vcf")).unwrap();
    assert!(freqs.is_empty());
    assert!(leftover_tables(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_external_tool_failure_removes_table() {
    let dir = tempfile::tempdir().unwrap();
    let tool = ExternalFrequencyTool {
        program: OsString::from("false"),
        temp_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    assert!(matches!(
        tool.run(Path::new("input.vcf")),
        Err(EvalError::ExternalTool(_))
    ));
    assert!(leftover_tables(dir.path()).is_empty());
}
