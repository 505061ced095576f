use crate::compare::DiscordanceMatrix;
use crate::{EvalError, EvalResult};

/// A statistic accumulated one discordance score at a time.
pub trait ScoreStatistic {
    fn from_iter_scores<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = f64>,
        Self: Default,
    {
        let mut ret = Self::default();
        for score in iter {
            ret.add_score(score)
        }
        ret
    }

    fn add_score(&mut self, score: f64);

    /// The statistic over every score added so far; 0 when none were added.
    fn as_raw(&self) -> f64;
}

/// Average discordance.
#[derive(Debug, Copy, Clone, Default)]
pub struct MeanDiscordance {
    sum: f64,
    n: usize,
}

impl ScoreStatistic for MeanDiscordance {
    fn add_score(&mut self, score: f64) {
        self.sum += score;
        self.n += 1;
    }

    fn as_raw(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum / self.n as f64
    }
}

/// Mean of squared scores. Large misses weigh more than in [`MeanDiscordance`].
#[derive(Debug, Copy, Clone, Default)]
pub struct MeanSquaredDiscordance {
    sum_sq: f64,
    n: usize,
}

impl ScoreStatistic for MeanSquaredDiscordance {
    fn add_score(&mut self, score: f64) {
        self.sum_sq += score * score;
        self.n += 1;
    }

    fn as_raw(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum_sq / self.n as f64
    }
}

/// `sqrt(mean(score²))`
#[derive(Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct RootMeanSquare(MeanSquaredDiscordance);

impl ScoreStatistic for RootMeanSquare {
    fn add_score(&mut self, score: f64) {
        self.0.add_score(score)
    }

    fn as_raw(&self) -> f64 {
        self.0.as_raw().sqrt()
    }
}

/// `ln(1 + mean(score²))`
#[derive(Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct Log1pMeanSquare(MeanSquaredDiscordance);

impl ScoreStatistic for Log1pMeanSquare {
    fn add_score(&mut self, score: f64) {
        self.0.add_score(score)
    }

    fn as_raw(&self) -> f64 {
        self.0.as_raw().ln_1p()
    }
}

/// Which axis of a [`DiscordanceMatrix`] the summaries are reported for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Axis {
    /// One value per variant, reduced over samples.
    Variant,
    /// One value per sample, reduced over variants.
    Sample,
}

/// Mean and RMSE for every position along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSummary {
    pub axis: Axis,
    pub labels: Vec<String>,
    pub mean: Vec<f64>,
    pub rmse: Vec<f64>,
}

impl AxisSummary {
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.labels
            .iter()
            .zip(self.mean.iter().zip(&self.rmse))
            .map(|(label, (&mean, &rmse))| (label.as_str(), mean, rmse))
    }
}

/// Whole-matrix summary.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DiscordanceSummary {
    pub mean: f64,
    pub rmse: f64,
    pub log1p_mse: f64,
    pub cells: usize,
}

fn require_cells(matrix: &DiscordanceMatrix) -> EvalResult<()> {
    if matrix.num_variants() == 0 {
        return Err(EvalError::Configuration(String::from(
            "cannot aggregate over an empty variant axis",
        )));
    }
    if matrix.num_samples() == 0 {
        return Err(EvalError::Configuration(String::from(
            "cannot aggregate over an empty sample axis",
        )));
    }
    Ok(())
}

/// Reduce `matrix` to one mean and one RMSE per position of `axis`.
///
/// # Errors
/// [`EvalError::Configuration`] if the matrix has no variants or no samples.
pub fn summarize_axis(matrix: &DiscordanceMatrix, axis: Axis) -> EvalResult<AxisSummary> {
    require_cells(matrix)?;

    let (labels, (mean, rmse)): (Vec<String>, (Vec<f64>, Vec<f64>)) = match axis {
        Axis::Variant => (
            matrix.variant_ids().to_vec(),
            matrix
                .rows()
                .map(|(_, row)| reduce(row.iter().copied()))
                .unzip(),
        ),
        Axis::Sample => (
            matrix.sample_ids().to_vec(),
            (0..matrix.num_samples())
                .filter_map(|sample| matrix.column(sample))
                .map(reduce)
                .unzip(),
        ),
    };

    Ok(AxisSummary {
        axis,
        labels,
        mean,
        rmse,
    })
}

fn reduce(scores: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut mean = MeanDiscordance::default();
    let mut rmse = RootMeanSquare::default();
    for score in scores {
        mean.add_score(score);
        rmse.add_score(score);
    }
    (mean.as_raw(), rmse.as_raw())
}

/// Mean, RMSE and `log1p` of the mean squared score over every cell.
///
/// # Errors
/// [`EvalError::Configuration`] if the matrix has no variants or no samples.
pub fn summarize(matrix: &DiscordanceMatrix) -> EvalResult<DiscordanceSummary> {
    require_cells(matrix)?;
    let scores = || matrix.scores().iter().copied();
    Ok(DiscordanceSummary {
        mean: MeanDiscordance::from_iter_scores(scores()).as_raw(),
        rmse: RootMeanSquare::from_iter_scores(scores()).as_raw(),
        log1p_mse: Log1pMeanSquare::from_iter_scores(scores()).as_raw(),
        cells: matrix.scores().len(),
    })
}

#[cfg(test)]
fn matrix_3x2(scores: Vec<f64>) -> DiscordanceMatrix {
    DiscordanceMatrix::from_scores(
        vec![String::from("rs1"), String::from("rs2"), String::from("rs3")],
        vec![String::from("HG00096"), String::from("HG00097")],
        scores,
    )
    .unwrap()
}

#[test]
fn test_all_zero_matrix() {
    let matrix = matrix_3x2(vec![0.0; 6]);
    let summary = summarize(&matrix).unwrap();
    assert_eq!(summary.mean, 0.0);
    assert_eq!(summary.rmse, 0.0);
    assert_eq!(summary.log1p_mse, 0.0);
    assert_eq!(summary.cells, 6);

    for axis in [Axis::Variant, Axis::Sample] {
        let per_axis = summarize_axis(&matrix, axis).unwrap();
        assert!(per_axis.mean.iter().chain(&per_axis.rmse).all(|&v| v == 0.0));
    }
}

#[test]
fn test_single_maximal_miss() {
    let matrix = matrix_3x2(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    let summary = summarize(&matrix).unwrap();
    assert!((summary.mean - 1.0 / 6.0).abs() < 1e-12);
    assert!((summary.rmse - (1.0f64 / 6.0).sqrt()).abs() < 1e-12);
    assert!((summary.log1p_mse - (1.0f64 / 6.0).ln_1p()).abs() < 1e-12);

    let per_variant = summarize_axis(&matrix, Axis::Variant).unwrap();
    assert_eq!(per_variant.labels, ["rs1", "rs2", "rs3"]);
    assert_eq!(per_variant.mean, [0.0, 0.5, 0.0]);
    assert!((per_variant.rmse[1] - 0.5f64.sqrt()).abs() < 1e-12);

    let per_sample = summarize_axis(&matrix, Axis::Sample).unwrap();
    assert_eq!(per_sample.labels, ["HG00096", "HG00097"]);
    assert_eq!(per_sample.mean[0], 0.0);
    assert!((per_sample.mean[1] - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(per_sample.rmse[0], 0.0);
}

#[test]
fn test_rmse_exceeds_mean_for_uneven_errors() {
    let matrix = matrix_3x2(vec![0.0, 0.0, 0.5, 0.5, 1.0, 0.0]);
    let summary = summarize(&matrix).unwrap();
    assert!(summary.rmse > summary.mean);
}

#[test]
fn test_empty_axis_is_a_configuration_error() {
    let no_variants = DiscordanceMatrix::from_scores(vec![], vec![String::from("a")], vec![]).unwrap();
    assert!(matches!(summarize(&no_variants), Err(EvalError::Configuration(_))));
    assert!(matches!(
        summarize_axis(&no_variants, Axis::Sample),
        Err(EvalError::Configuration(_))
    ));

    let no_samples = DiscordanceMatrix::from_scores(vec![String::from("rs1")], vec![], vec![]).unwrap();
    assert!(matches!(
        summarize_axis(&no_samples, Axis::Variant),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_statistics_on_nothing() {
    assert_eq!(MeanDiscordance::default().as_raw(), 0.0);
    assert_eq!(RootMeanSquare::from_iter_scores(std::iter::empty()).as_raw(), 0.0);
}
