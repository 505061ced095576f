//! Per-cell discordance between a truth and a candidate [`GenotypeArray`].

use crate::{EvalError, EvalResult, GenotypeArray, GenotypeCall};
use itertools::Itertools;

/// Dosage differences are clipped to `0..=2`; dividing by this keeps scores in `[0, 1]`.
pub const DISCORDANCE_NORMALIZATION: f64 = 2.0;

/// Distance between two calls of the same sample at the same variant.
///
/// Each call collapses to its dosage, the sum of its allele codes, so `0|1` and
/// `1|0` agree. A missing allele counts as `-1`: `./.` against `0/0` is a full
/// mismatch. The difference is clipped at 2 since `./.` against `1/1` would
/// otherwise reach 4.
pub fn discordance(truth: GenotypeCall, candidate: GenotypeCall) -> f64 {
    let diff = (truth.code_sum() - candidate.code_sum()).unsigned_abs().min(2);
    diff as f64 / DISCORDANCE_NORMALIZATION
}

/// Two arrays known to share the same variants and samples, in the same order.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonPair<'a> {
    truth: &'a GenotypeArray,
    candidate: &'a GenotypeArray,
}

impl<'a> ComparisonPair<'a> {
    /// # Errors
    ///
    /// [`EvalError::DimensionMismatch`] if the shapes differ, or if variant or
    /// sample identifiers differ at any position.
    pub fn new(truth: &'a GenotypeArray, candidate: &'a GenotypeArray) -> EvalResult<Self> {
        if truth.shape() != candidate.shape() {
            return Err(EvalError::DimensionMismatch(format!(
                "truth is {:?} (variants, samples) but candidate is {:?}",
                truth.shape(),
                candidate.shape()
            )));
        }
        if let Some((i, (t, c))) = truth
            .variant_ids()
            .iter()
            .zip(candidate.variant_ids())
            .enumerate()
            .find(|(_, (t, c))| t != c)
        {
            return Err(EvalError::DimensionMismatch(format!(
                "variant {i} is {t} in truth but {c} in candidate"
            )));
        }
        if let Some((i, (t, c))) = truth
            .sample_ids()
            .iter()
            .zip(candidate.sample_ids())
            .enumerate()
            .find(|(_, (t, c))| t != c)
        {
            return Err(EvalError::DimensionMismatch(format!(
                "sample column {i} is {t} in truth but {c} in candidate"
            )));
        }
        Ok(Self { truth, candidate })
    }

    pub fn truth(&self) -> &'a GenotypeArray {
        self.truth
    }

    pub fn candidate(&self) -> &'a GenotypeArray {
        self.candidate
    }

    pub fn discordance_matrix(&self) -> DiscordanceMatrix {
        let scores = self
            .truth
            .iter()
            .zip_eq(self.candidate.iter())
            .flat_map(|(t, c)| {
                t.calls()
                    .iter()
                    .zip_eq(c.calls())
                    .map(|(&t, &c)| discordance(t, c))
            })
            .collect();

        DiscordanceMatrix {
            scores,
            variant_ids: self.truth.variant_ids().to_vec(),
            sample_ids: self.truth.sample_ids().to_vec(),
        }
    }
}

/// Validate `truth` against `candidate` and score every cell.
pub fn compare(truth: &GenotypeArray, candidate: &GenotypeArray) -> EvalResult<DiscordanceMatrix> {
    Ok(ComparisonPair::new(truth, candidate)?.discordance_matrix())
}

/// Variant × sample discordance scores.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscordanceMatrix {
    // row-major, like GenotypeArray
    scores: Vec<f64>,
    variant_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl DiscordanceMatrix {
    /// Assemble a matrix from row-major scores.
    ///
    /// # Errors
    /// [`EvalError::DimensionMismatch`] if `scores` does not hold one value per cell.
    pub fn from_scores(
        variant_ids: Vec<String>,
        sample_ids: Vec<String>,
        scores: Vec<f64>,
    ) -> EvalResult<Self> {
        if scores.len() != variant_ids.len() * sample_ids.len() {
            return Err(EvalError::DimensionMismatch(format!(
                "{} scores for {} variants and {} samples",
                scores.len(),
                variant_ids.len(),
                sample_ids.len()
            )));
        }
        Ok(Self {
            scores,
            variant_ids,
            sample_ids,
        })
    }

    pub fn num_variants(&self) -> usize {
        self.variant_ids.len()
    }

    pub fn num_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn variant_ids(&self) -> &[String] {
        &self.variant_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn get(&self, variant: usize, sample: usize) -> Option<f64> {
        if sample >= self.num_samples() {
            return None;
        }
        self.scores.get(variant * self.num_samples() + sample).copied()
    }

    /// Scores of one variant across samples.
    pub fn row(&self, variant: usize) -> Option<&[f64]> {
        let n = self.num_samples();
        (variant < self.num_variants()).then(|| &self.scores[variant * n..(variant + 1) * n])
    }

    /// Scores of one sample across variants.
    pub fn column(&self, sample: usize) -> Option<impl Iterator<Item = f64> + '_> {
        (sample < self.num_samples()).then(|| {
            self.scores
                .iter()
                .skip(sample)
                .step_by(self.num_samples())
                .copied()
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.variant_ids
            .iter()
            .map(String::as_str)
            .zip(self.scores.chunks_exact(self.num_samples().max(1)))
    }

    /// All scores, row-major.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

#[cfg(test)]
use crate::RawCall;

#[cfg(test)]
fn single_cell(a: i32, b: i32) -> GenotypeArray {
    GenotypeArray::from_tabular(vec![(String::from("rs1"), vec![RawCall::unphased(a, b)])]).unwrap()
}

#[test]
fn test_maximal_mismatch() {
    let matrix = compare(&single_cell(0, 0), &single_cell(1, 1)).unwrap();
    assert_eq!(matrix.get(0, 0), Some(1.0));
}

#[test]
fn test_normalization_halves_dosage_difference() {
    // dosage 0 vs 1: raw difference 1, normalized 0.5
    let matrix = compare(&single_cell(0, 0), &single_cell(0, 1)).unwrap();
    assert_eq!(matrix.get(0, 0), Some(0.5));
    assert_eq!(DISCORDANCE_NORMALIZATION, 2.0);
}

#[test]
fn test_phase_is_not_discordance() {
    let matrix = compare(&single_cell(0, 1), &single_cell(1, 0)).unwrap();
    assert_eq!(matrix.get(0, 0), Some(0.0));
}

#[test]
fn test_missing_alleles_lower_the_dosage() {
    use crate::AlleleCode::{Alt, Missing, Ref};

    assert_eq!(discordance(GenotypeCall::MISSING, GenotypeCall::HOM_REF), 1.0);
    assert_eq!(discordance(GenotypeCall::MISSING, GenotypeCall::HOM_ALT), 1.0);
    assert_eq!(discordance(GenotypeCall::MISSING, GenotypeCall::MISSING), 0.0);
    assert_eq!(discordance(GenotypeCall(Missing, Ref), GenotypeCall::HOM_REF), 0.5);
    assert_eq!(discordance(GenotypeCall(Ref, Missing), GenotypeCall::HET), 1.0);
    // dosage -1 + 1 == 0 + 0
    assert_eq!(discordance(GenotypeCall(Missing, Alt), GenotypeCall::HOM_REF), 0.0);
}

#[test]
fn test_all_missing_candidate_is_discordant() {
    let rows = |call: [i32; 2]| {
        (1..=3)
            .map(|i| (format!("rs{i}"), vec![RawCall::from(call); 2]))
            .collect::<Vec<_>>()
    };
    let truth = GenotypeArray::from_tabular(rows([0, 0])).unwrap();
    let candidate = GenotypeArray::from_tabular(rows([-1, -1])).unwrap();

    let matrix = compare(&truth, &candidate).unwrap();
    assert!(matrix.scores().iter().all(|&s| s == 1.0));
    let summary = crate::aggregate::summarize(&matrix).unwrap();
    assert_eq!(summary.mean, 1.0);
    assert_eq!(summary.rmse, 1.0);
}

#[test]
fn test_shape_mismatch() {
    let truth = single_cell(0, 0);
    let candidate = GenotypeArray::from_tabular(vec![
        (String::from("rs1"), vec![RawCall::unphased(0, 0)]),
        (String::from("rs2"), vec![RawCall::unphased(0, 0)]),
    ])
    .unwrap();
    assert!(matches!(
        compare(&truth, &candidate),
        Err(EvalError::DimensionMismatch(_))
    ));
}

#[test]
fn test_order_mismatch_is_not_realigned() {
    let truth = GenotypeArray::from_tabular(vec![
        (String::from("rs1"), vec![RawCall::unphased(0, 0)]),
        (String::from("rs2"), vec![RawCall::unphased(1, 1)]),
    ])
    .unwrap();
    let candidate = GenotypeArray::from_tabular(vec![
        (String::from("rs2"), vec![RawCall::unphased(1, 1)]),
        (String::from("rs1"), vec![RawCall::unphased(0, 0)]),
    ])
    .unwrap();
    assert!(matches!(
        compare(&truth, &candidate),
        Err(EvalError::DimensionMismatch(_))
    ));

    let renamed = GenotypeArray::from_records(
        ["NA12878"],
        &[crate::VariantRecord {
            id: Some(String::from("rs1")),
            calls: vec![RawCall::unphased(0, 0)],
            ..Default::default()
        }],
    )
    .unwrap();
    assert!(matches!(
        compare(&single_cell(0, 0), &renamed),
        Err(EvalError::DimensionMismatch(_))
    ));
}

#[test]
fn test_matrix_accessors() {
    let matrix = DiscordanceMatrix::from_scores(
        vec![String::from("rs1"), String::from("rs2")],
        vec![String::from("a"), String::from("b"), String::from("c")],
        vec![0.0, 0.5, 1.0, 0.0, 0.0, 0.5],
    )
    .unwrap();
    assert_eq!(matrix.row(1), Some(&[0.0, 0.0, 0.5][..]));
    assert_eq!(matrix.column(2).unwrap().collect::<Vec<_>>(), [1.0, 0.5]);
    assert!(matrix.column(3).is_none());
    assert_eq!(matrix.rows().count(), 2);

    assert!(matches!(
        DiscordanceMatrix::from_scores(vec![String::from("rs1")], vec![], vec![0.0]),
        Err(EvalError::DimensionMismatch(_))
    ));
}
