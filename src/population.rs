use crate::aggregate::{MeanDiscordance, RootMeanSquare, ScoreStatistic};
use crate::compare::DiscordanceMatrix;
use crate::{EvalError, EvalResult};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;

/// Assigns a sample to a population.
pub trait WhichPopulation<E> {
    fn which_population<'a>(&'a self, sample_name: &str) -> Result<Cow<'a, str>, E>;
}

impl<E, T> WhichPopulation<E> for T
where
    T: Fn(&str) -> Result<Cow<'static, str>, E>,
{
    fn which_population<'a>(&'a self, sample_name: &str) -> Result<Cow<'a, str>, E> {
        self(sample_name)
    }
}

/// Sample-to-population table, as found in panel files.
#[derive(Debug, Clone, Default)]
pub struct PopulationMap(HashMap<String, String>);

impl PopulationMap {
    /// Read `sample<TAB>population[<TAB>...]` lines. A first line whose first
    /// column is `sample` is taken as a header.
    pub fn from_reader(reader: impl BufRead) -> EvalResult<Self> {
        let mut map = HashMap::new();
        for (line_i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut columns = line.split('\t');
            let sample = columns.next().unwrap_or_default();
            if line_i == 0 && sample == "sample" {
                continue;
            }
            let population = columns.next().filter(|p| !p.is_empty()).ok_or_else(|| {
                EvalError::Configuration(format!(
                    "population table line {} has no population column",
                    line_i + 1
                ))
            })?;
            map.insert(sample.to_owned(), population.to_owned());
        }
        Ok(Self(map))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for PopulationMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl WhichPopulation<EvalError> for PopulationMap {
    fn which_population<'a>(&'a self, sample_name: &str) -> Result<Cow<'a, str>, EvalError> {
        self.0
            .get(sample_name)
            .map(|p| Cow::Borrowed(p.as_str()))
            .ok_or_else(|| {
                EvalError::Configuration(format!("sample {sample_name} has no population"))
            })
    }
}

/// Discordance over every cell of one population's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    pub population: String,
    pub num_samples: usize,
    pub mean: f64,
    pub rmse: f64,
}

/// Group the sample columns of `matrix` by population, in order of first appearance.
pub fn summarize_populations<W, E>(
    matrix: &DiscordanceMatrix,
    mapper: &W,
) -> Result<Vec<PopulationSummary>, E>
where
    W: WhichPopulation<E>,
{
    let mut accumulator = PopulationAccumulator::default();
    accumulator.add_matrix(matrix, mapper)?;
    Ok(accumulator.finish())
}

#[derive(Debug)]
struct PopulationTotals {
    population: String,
    samples: HashSet<String>,
    mean: MeanDiscordance,
    rmse: RootMeanSquare,
}

/// Per-population discordance folded over successive matrices, such as the
/// chunks of one evaluation.
#[derive(Debug, Default)]
pub struct PopulationAccumulator {
    population_name_to_idx: HashMap<String, usize>,
    groups: Vec<PopulationTotals>,
    // population index of every column, for the samples of the last matrix
    sample_ids: Vec<String>,
    column_groups: Vec<usize>,
}

impl PopulationAccumulator {
    /// Add every cell of `matrix` to the population of its sample.
    ///
    /// The mapper is only consulted when the sample columns differ from the
    /// previous matrix.
    pub fn add_matrix<W, E>(&mut self, matrix: &DiscordanceMatrix, mapper: &W) -> Result<(), E>
    where
        W: WhichPopulation<E>,
    {
        if self.sample_ids.as_slice() != matrix.sample_ids() || self.column_groups.is_empty() {
            self.map_columns(matrix.sample_ids(), mapper)?;
        }
        for (_, scores) in matrix.rows() {
            for (&group, &score) in self.column_groups.iter().zip(scores) {
                let totals = &mut self.groups[group];
                totals.mean.add_score(score);
                totals.rmse.add_score(score);
            }
        }
        Ok(())
    }

    fn map_columns<W, E>(&mut self, sample_ids: &[String], mapper: &W) -> Result<(), E>
    where
        W: WhichPopulation<E>,
    {
        let mut column_groups = Vec::with_capacity(sample_ids.len());
        for sample_name in sample_ids {
            let pop_name = mapper.which_population(sample_name)?;
            let idx = match self.population_name_to_idx.get(&*pop_name) {
                Some(&idx) => idx,
                None => {
                    let idx = self.groups.len();
                    self.population_name_to_idx
                        .insert(pop_name.clone().into_owned(), idx);
                    self.groups.push(PopulationTotals {
                        population: pop_name.into_owned(),
                        samples: HashSet::new(),
                        mean: MeanDiscordance::default(),
                        rmse: RootMeanSquare::default(),
                    });
                    idx
                }
            };
            self.groups[idx].samples.insert(sample_name.clone());
            column_groups.push(idx);
        }
        self.sample_ids = sample_ids.to_vec();
        self.column_groups = column_groups;
        Ok(())
    }

    /// One summary per population, in order of first appearance.
    pub fn finish(self) -> Vec<PopulationSummary> {
        self.groups
            .into_iter()
            .map(|totals| PopulationSummary {
                population: totals.population,
                num_samples: totals.samples.len(),
                mean: totals.mean.as_raw(),
                rmse: totals.rmse.as_raw(),
            })
            .collect()
    }
}

#[cfg(test)]
fn two_by_four() -> DiscordanceMatrix {
    DiscordanceMatrix::from_scores(
        vec![String::from("rs1"), String::from("rs2")],
        ["s0", "s1", "s2", "s3"].iter().map(|s| s.to_string()).collect(),
        vec![0.0, 1.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.5],
    )
    .unwrap()
}

#[test]
fn test_population_table() {
    let table = "sample\tpop\tsuper_pop\tgender\ns0\tGBR\tEUR\tmale\ns1\tYRI\tAFR\tfemale\n\ns2\tGBR\tEUR\tfemale\ns3\tYRI\tAFR\tmale\n";
    let map = PopulationMap::from_reader(table.as_bytes()).unwrap();
    assert_eq!(map.len(), 4);

    let summaries = summarize_populations(&two_by_four(), &map).unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].population, "GBR");
    assert_eq!(summaries[0].num_samples, 2);
    assert_eq!(summaries[0].mean, 0.0);
    assert_eq!(summaries[1].population, "YRI");
    assert!((summaries[1].mean - 2.0 / 4.0).abs() < 1e-12);
    assert!((summaries[1].rmse - (1.5f64 / 4.0).sqrt()).abs() < 1e-12);
}

#[test]
fn test_unknown_sample() {
    let map = [(String::from("s0"), String::from("GBR"))]
        .into_iter()
        .collect::<PopulationMap>();
    assert!(matches!(
        summarize_populations(&two_by_four(), &map),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_population_from_closure() {
    let summaries = summarize_populations(&two_by_four(), &|sample: &str| {
        let numeric_part = sample.split_at(1).1;
        let parsed = numeric_part.parse::<u8>().map_err(|_| ())?;
        Ok::<_, ()>(match parsed % 2 {
            0 => Cow::Borrowed("even"),
            _ => Cow::Borrowed("odd"),
        })
    })
    .unwrap();
    assert_eq!(summaries[0].population, "even");
    assert_eq!(summaries[1].population, "odd");
    assert_eq!(summaries[1].num_samples, 2);
}

#[test]
fn test_population_table_without_population() {
    assert!(matches!(
        PopulationMap::from_reader("s0\n".as_bytes()),
        Err(EvalError::Configuration(_))
    ));
}

#[test]
fn test_accumulating_chunks_matches_whole_matrix() {
    let map = [("s0", "GBR"), ("s1", "YRI"), ("s2", "GBR"), ("s3", "YRI")]
        .into_iter()
        .map(|(s, p)| (s.to_string(), p.to_string()))
        .collect::<PopulationMap>();
    let samples = ["s0", "s1", "s2", "s3"].map(String::from).to_vec();
    let first = DiscordanceMatrix::from_scores(
        vec![String::from("rs1")],
        samples.clone(),
        vec![0.0, 1.0, 0.0, 0.5],
    )
    .unwrap();
    let second = DiscordanceMatrix::from_scores(
        vec![String::from("rs2")],
        samples,
        vec![0.0, 0.0, 0.0, 0.5],
    )
    .unwrap();

    let mut accumulator = PopulationAccumulator::default();
    accumulator.add_matrix(&first, &map).unwrap();
    accumulator.add_matrix(&second, &map).unwrap();
    assert_eq!(
        accumulator.finish(),
        summarize_populations(&two_by_four(), &map).unwrap()
    );
}
