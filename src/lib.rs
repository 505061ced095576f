pub mod adapter;
pub mod aggregate;
mod allele;
mod array;
pub mod classify;
pub mod compare;
pub mod config;
pub mod frequency;
pub mod iter;
pub mod likelihood;
pub mod pipeline;
pub mod population;
mod record;
pub mod table;

#[cfg(test)]
mod test;
#[cfg(test)]
mod testdata;

pub use allele::*;
pub use array::*;
pub use record::*;

pub type EvalResult<T> = Result<T, EvalError>;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[cfg(feature = "noodles")]
    #[error("couldn't handle VCF: {0}")]
    NoodlesVCF(std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record {variant}: {reason}")]
    MalformedRecord { variant: String, reason: String },
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("genotype call {0:?} matches no likelihood rule")]
    UnsupportedGenotype([AlleleCode; 2]),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("external frequency tool failed: {0}")]
    ExternalTool(String),
}

impl EvalError {
    pub(crate) fn malformed(variant: impl Into<String>, reason: impl Into<String>) -> Self {
        EvalError::MalformedRecord {
            variant: variant.into(),
            reason: reason.into(),
        }
    }
}
