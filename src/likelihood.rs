//! Genotype likelihoods derived from hard calls, and their serialization as a
//! `GL` FORMAT field.
//!
//! A call maps onto a [`LikelihoodVector`] through a fixed table: complete calls
//! put all mass on their genotype, half-missing calls split it between the two
//! genotypes still compatible with the observed allele, and fully missing calls
//! fall back to a configurable prior.

use crate::{AlleleCode, EvalError, EvalResult, GenotypeCall, VariantRecord};
use itertools::Itertools;
use std::io::Write;

/// FORMAT key written in place of `GT`.
pub const LIKELIHOOD_KEY: &str = "GL";

/// Components at or below this are floored when log-scaling.
pub const LOG_FLOOR_THRESHOLD: f64 = 1e-5;
pub const LOG_FLOOR: f64 = -5.0;

/// `[P(hom ref), P(het), P(hom alt)]`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LikelihoodVector(pub [f64; 3]);

impl LikelihoodVector {
    pub const HOM_REF: Self = Self([1.0, 0.0, 0.0]);
    pub const HET: Self = Self([0.0, 1.0, 0.0]);
    pub const HOM_ALT: Self = Self([0.0, 0.0, 1.0]);
    pub const HALF_ALT: Self = Self([0.0, 0.5, 0.5]);
    pub const HALF_REF: Self = Self([0.5, 0.5, 0.0]);
    pub const UNIFORM: Self = Self([1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);

    pub fn components(&self) -> [f64; 3] {
        self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// `log10` of each component, components at or below 1e-5 becoming exactly -5.
    pub fn log10_floored(&self) -> [f64; 3] {
        self.0.map(|p| {
            if p <= LOG_FLOOR_THRESHOLD {
                LOG_FLOOR
            } else {
                p.log10()
            }
        })
    }
}

/// How likelihoods are written.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum LikelihoodScale {
    #[default]
    Linear,
    Log10,
}

/// Encoder settings. The prior for fully missing calls is checked once, here.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LikelihoodEncoderConfig {
    scale: LikelihoodScale,
    // used for calls with both alleles missing
    missing_default: LikelihoodVector,
}

impl LikelihoodEncoderConfig {
    /// # Errors
    /// [`EvalError::Configuration`] if `missing_default` has a negative or
    /// non-finite component, or does not sum to 1.
    pub fn new(scale: LikelihoodScale, missing_default: LikelihoodVector) -> EvalResult<Self> {
        let components = missing_default.components();
        if components.iter().any(|p| !p.is_finite() || *p < 0.0)
            || (missing_default.sum() - 1.0).abs() > 1e-9
        {
            return Err(EvalError::Configuration(format!(
                "missing-call prior {components:?} is not a probability vector"
            )));
        }
        Ok(Self {
            scale,
            missing_default,
        })
    }

    pub fn with_scale(self, scale: LikelihoodScale) -> Self {
        Self { scale, ..self }
    }

    pub fn scale(&self) -> LikelihoodScale {
        self.scale
    }

    pub fn missing_default(&self) -> LikelihoodVector {
        self.missing_default
    }
}

impl Default for LikelihoodEncoderConfig {
    fn default() -> Self {
        Self {
            scale: LikelihoodScale::Linear,
            missing_default: LikelihoodVector::UNIFORM,
        }
    }
}

/// Map a call onto its likelihood vector.
///
/// Rules are tried in order: heterozygous, homozygous ALT, homozygous REF,
/// missing + ALT, missing + REF, fully missing.
pub fn likelihood_for(
    call: GenotypeCall,
    missing_default: LikelihoodVector,
) -> EvalResult<LikelihoodVector> {
    let has_ref = call.contains(AlleleCode::Ref);
    let has_alt = call.contains(AlleleCode::Alt);
    let missing = call.count(AlleleCode::Missing);

    if has_ref && has_alt {
        Ok(LikelihoodVector::HET)
    } else if has_alt && missing == 0 {
        Ok(LikelihoodVector::HOM_ALT)
    } else if has_ref && missing == 0 {
        Ok(LikelihoodVector::HOM_REF)
    } else if missing == 1 && has_alt {
        Ok(LikelihoodVector::HALF_ALT)
    } else if missing == 1 && has_ref {
        Ok(LikelihoodVector::HALF_REF)
    } else if missing == 2 {
        Ok(missing_default)
    } else {
        Err(EvalError::UnsupportedGenotype(call.alleles()))
    }
}

/// Header line declaring the likelihood field.
pub fn likelihood_format_line() -> String {
    format!(
        "##FORMAT=<ID={LIKELIHOOD_KEY},Number=G,Type=Float,Description=\"Genotype likelihoods for the three genotype classes (hom ref, het, hom alt)\">"
    )
}

/// Rewrite header lines for a likelihood-only file.
///
/// The `GT` FORMAT declaration is dropped and the `GL` declaration inserted
/// right before the `#CHROM` line. Any existing `GL` declaration is replaced.
pub fn rewrite_header<'l>(lines: impl IntoIterator<Item = &'l str>) -> EvalResult<Vec<String>> {
    let mut out = Vec::new();
    let mut saw_column_line = false;
    for line in lines {
        let line = line.trim_end_matches(['\r', '\n']);
        if is_format_declaration(line, "GT") || is_format_declaration(line, LIKELIHOOD_KEY) {
            continue;
        }
        if line.starts_with("#CHROM") {
            out.push(likelihood_format_line());
            saw_column_line = true;
            // sites-only files gain the FORMAT column every data line carries
            if line.split('\t').count() == 8 {
                out.push(format!("{line}\tFORMAT"));
                continue;
            }
        }
        out.push(line.to_owned());
    }
    if !saw_column_line {
        return Err(EvalError::Configuration(String::from(
            "header has no #CHROM column line",
        )));
    }
    Ok(out)
}

fn is_format_declaration(line: &str, id: &str) -> bool {
    line.strip_prefix("##FORMAT=<ID=")
        .and_then(|rest| rest.strip_prefix(id))
        .is_some_and(|rest| rest.starts_with([',', '>']))
}

/// Streams variant records as likelihood lines.
pub struct LikelihoodWriter<W: Write> {
    inner: W,
    config: LikelihoodEncoderConfig,
    num_samples: Option<usize>,
    // reused between records
    buf_line: String,
}

impl<W: Write> LikelihoodWriter<W> {
    pub fn new(inner: W, config: LikelihoodEncoderConfig) -> Self {
        Self {
            inner,
            config,
            num_samples: None,
            buf_line: String::new(),
        }
    }

    /// Write the rewritten header. The number of sample columns on the `#CHROM`
    /// line fixes the number of calls every record must carry.
    pub fn write_header<'l>(&mut self, lines: impl IntoIterator<Item = &'l str>) -> EvalResult<()> {
        let lines = rewrite_header(lines)?;
        for line in &lines {
            if line.starts_with("#CHROM") {
                self.num_samples = Some(line.split('\t').count().saturating_sub(9));
            }
            writeln!(self.inner, "{line}")?;
        }
        Ok(())
    }

    /// Encode and write one record. Nothing is written if any call is invalid.
    pub fn write_record(&mut self, record: &VariantRecord) -> EvalResult<()> {
        if let Some(expected) = self.num_samples {
            if record.num_samples() != expected {
                return Err(EvalError::DimensionMismatch(format!(
                    "variant {} has {} samples, header declares {expected}",
                    record.key(),
                    record.num_samples()
                )));
            }
        }

        self.buf_line.clear();
        encode_record(record, &self.config, &mut self.buf_line)?;
        self.inner.write_all(self.buf_line.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> EvalResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Append the full likelihood line for `record`, newline included, to `line`.
pub fn encode_record(
    record: &VariantRecord,
    config: &LikelihoodEncoderConfig,
    line: &mut String,
) -> EvalResult<()> {
    use std::fmt::Write;

    let quality = match record.quality {
        Some(q) => q.to_string(),
        None => String::from("."),
    };
    // writing into a String cannot fail
    let _ = write!(
        line,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        record.chrom,
        record.position,
        record.id.as_deref().unwrap_or("."),
        record.reference,
        record.alternate,
        quality,
        record.filter.as_deref().unwrap_or("PASS"),
        record.info_field(),
        LIKELIHOOD_KEY,
    );

    for call in record.genotype_calls() {
        let likelihood = likelihood_for(call?, config.missing_default)?;
        let components = match config.scale {
            LikelihoodScale::Linear => likelihood.components(),
            LikelihoodScale::Log10 => likelihood.log10_floored(),
        };
        let _ = write!(line, "\t{}", components.iter().join(","));
    }
    line.push('\n');
    Ok(())
}

#[cfg(test)]
use crate::AlleleCode::{Alt, Missing, Ref};

#[cfg(test)]
fn gl(a: AlleleCode, b: AlleleCode) -> LikelihoodVector {
    likelihood_for(GenotypeCall(a, b), LikelihoodVector::UNIFORM).unwrap()
}

#[test]
fn test_decision_table() {
    assert_eq!(gl(Ref, Ref), LikelihoodVector([1.0, 0.0, 0.0]));
    assert_eq!(gl(Ref, Alt), LikelihoodVector([0.0, 1.0, 0.0]));
    assert_eq!(gl(Alt, Ref), LikelihoodVector([0.0, 1.0, 0.0]));
    assert_eq!(gl(Alt, Alt), LikelihoodVector([0.0, 0.0, 1.0]));
    assert_eq!(gl(Missing, Alt), LikelihoodVector([0.0, 0.5, 0.5]));
    assert_eq!(gl(Alt, Missing), LikelihoodVector([0.0, 0.5, 0.5]));
    assert_eq!(gl(Missing, Ref), LikelihoodVector([0.5, 0.5, 0.0]));
    assert_eq!(gl(Missing, Missing), LikelihoodVector::UNIFORM);
}

#[test]
fn test_missing_default_is_configurable() {
    let prior = LikelihoodVector([0.8, 0.15, 0.05]);
    assert_eq!(likelihood_for(GenotypeCall::MISSING, prior).unwrap(), prior);
    assert_eq!(
        likelihood_for(GenotypeCall::HOM_REF, prior).unwrap(),
        LikelihoodVector::HOM_REF
    );
}

#[test]
fn test_encoder_config_validates_prior() {
    let prior = LikelihoodVector([0.8, 0.15, 0.05]);
    let config = LikelihoodEncoderConfig::new(LikelihoodScale::Linear, prior).unwrap();
    assert_eq!(config.missing_default(), prior);

    for bad in [
        LikelihoodVector([0.5, 0.5, 0.5]),
        LikelihoodVector([1.5, -0.5, 0.0]),
        LikelihoodVector([f64::NAN, 0.5, 0.5]),
        LikelihoodVector([0.0, 0.0, 0.0]),
    ] {
        assert!(matches!(
            LikelihoodEncoderConfig::new(LikelihoodScale::Log10, bad),
            Err(EvalError::Configuration(_))
        ));
    }
}

#[test]
fn test_log10_floor() {
    assert_eq!(LikelihoodVector::HOM_ALT.log10_floored(), [-5.0, -5.0, 0.0]);
    assert_eq!(LikelihoodVector([1e-5, 0.5, 0.5 - 1e-5]).log10_floored()[0], -5.0);
    let half = LikelihoodVector::HALF_REF.log10_floored();
    assert!((half[0] - 0.5f64.log10()).abs() < 1e-12);
    assert_eq!(half[2], -5.0);
}

#[test]
fn test_rewrite_header_swaps_gt_for_gl() {
    let header = [
        "##fileformat=VCFv4.2",
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
        "##FORMAT=<ID=GTX,Number=1,Type=String,Description=\"Unrelated\">",
        "##contig=<ID=20>",
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG00096\tHG00097",
    ];
    let rewritten = rewrite_header(header).unwrap();
    assert_eq!(rewritten.len(), 5);
    assert!(!rewritten.iter().any(|l| l.starts_with("##FORMAT=<ID=GT,")));
    assert!(rewritten.iter().any(|l| l.starts_with("##FORMAT=<ID=GTX,")));
    assert_eq!(rewritten[3], likelihood_format_line());
    assert!(rewritten[4].starts_with("#CHROM"));

    assert!(matches!(
        rewrite_header(["##fileformat=VCFv4.2"]),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_encode_record_line() {
    use crate::{parse_info_field, RawCall};

    let record = VariantRecord {
        chrom: String::from("20"),
        position: 61098,
        id: Some(String::from("rs6078030")),
        reference: String::from("C"),
        alternate: String::from("T"),
        quality: None,
        filter: None,
        info: parse_info_field("AF=0.28"),
        calls: vec![
            RawCall::phased(0, 1),
            RawCall::unphased(-1, 0),
            RawCall::MISSING,
        ],
    };

    let mut line = String::new();
    encode_record(&record, &LikelihoodEncoderConfig::default(), &mut line).unwrap();
    let third = 1.0f64 / 3.0;
    assert_eq!(
        line,
        format!("20\t61098\trs6078030\tC\tT\t.\tPASS\tAF=0.28\tGL\t0,1,0\t0.5,0.5,0\t{third},{third},{third}\n")
    );

    let mut line = String::new();
    let config = LikelihoodEncoderConfig::default().with_scale(LikelihoodScale::Log10);
    encode_record(&record, &config, &mut line).unwrap();
    let fields = line.trim_end().split('\t').collect::<Vec<_>>();
    assert_eq!(fields[9], "-5,0,-5");
}

#[test]
fn test_writer_rejects_bad_records_without_output() {
    use crate::RawCall;

    let mut writer = LikelihoodWriter::new(Vec::new(), LikelihoodEncoderConfig::default());
    writer
        .write_header(["##fileformat=VCFv4.2", "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts0"])
        .unwrap();
    let header_len = writer.inner.len();

    let malformed = VariantRecord {
        calls: vec![RawCall::unphased(0, 2)],
        ..Default::default()
    };
    assert!(matches!(
        writer.write_record(&malformed),
        Err(EvalError::MalformedRecord { .. })
    ));

    let too_wide = VariantRecord {
        calls: vec![RawCall::unphased(0, 0); 2],
        ..Default::default()
    };
    assert!(matches!(
        writer.write_record(&too_wide),
        Err(EvalError::DimensionMismatch(_))
    ));
    assert_eq!(writer.into_inner().len(), header_len);
}
