use crate::{EvalError, EvalResult};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Settings of one discordance evaluation, handed to each component that needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationConfig {
    label: String,
    chunk_size: usize,
    sorted: bool,
    output_dir: PathBuf,
}

impl EvaluationConfig {
    /// # Errors
    /// [`EvalError::Configuration`] for an empty label or a chunk size of zero.
    pub fn new(label: impl Into<String>, chunk_size: usize) -> EvalResult<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(EvalError::Configuration(String::from(
                "dataset label may not be empty",
            )));
        }
        if chunk_size == 0 {
            return Err(EvalError::Configuration(String::from(
                "chunk size must be at least 1",
            )));
        }
        Ok(Self {
            label,
            chunk_size,
            sorted: false,
            output_dir: PathBuf::from("."),
        })
    }

    /// Mark the input as position-sorted; reflected in the table name.
    pub fn sorted(self, sorted: bool) -> Self {
        Self { sorted, ..self }
    }

    pub fn with_output_dir(self, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..self
        }
    }

    /// Same settings under another dataset label.
    pub fn relabel(&self, label: impl Into<String>) -> EvalResult<Self> {
        Ok(Self::new(label, self.chunk_size)?
            .sorted(self.sorted)
            .with_output_dir(&self.output_dir))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<label>[.sorted].chunk<chunk size>.csv`
    pub fn table_file_name(&self) -> String {
        format!(
            "{}{}.chunk{}.csv",
            self.label,
            if self.sorted { ".sorted" } else { "" },
            self.chunk_size
        )
    }

    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(self.table_file_name())
    }
}

#[test]
fn test_table_file_name() {
    let config = EvaluationConfig::new("pooled", 1000).unwrap();
    assert_eq!(config.table_file_name(), "pooled.chunk1000.csv");

    let config = config.sorted(true).with_output_dir("/tmp/run");
    assert_eq!(config.table_file_name(), "pooled.sorted.chunk1000.csv");
    assert_eq!(
        config.table_path(),
        PathBuf::from("/tmp/run/pooled.sorted.chunk1000.csv")
    );

    let missing = config.relabel("missing").unwrap();
    assert_eq!(missing.table_file_name(), "missing.sorted.chunk1000.csv");
    assert_eq!(missing.output_dir(), Path::new("/tmp/run"));
}

#[test]
fn test_invalid_config() {
    assert!(matches!(
        EvaluationConfig::new("pooled", 0),
        Err(EvalError::Configuration(_))
    ));
    assert!(matches!(
        EvaluationConfig::new("", 10),
        Err(EvalError::Configuration(_))
    ));
}
