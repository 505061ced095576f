use crate::iter::{VariantRow, VariantRowsIter};
use crate::{AlleleCode, EvalError, EvalResult, GenotypeCall, RawCall, VariantRecord};

/// Dense (variant × sample × allele) genotype calls for one chunk of variants.
///
/// Every variant shares the same sample ordering. The array is immutable once
/// built; loading another chunk produces a new array.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeArray {
    // row-major: calls[variant * num_samples + sample]
    calls: Vec<GenotypeCall>,
    variant_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl GenotypeArray {
    /// Start building an array whose columns are `sample_ids`.
    pub fn builder(sample_ids: impl IntoIterator<Item = impl Into<String>>) -> GenotypeArrayBuilder {
        GenotypeArrayBuilder {
            sample_ids: Some(sample_ids.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Build an array from `(variant id, calls)` rows. Sample cardinality is taken
    /// from the first row and samples are named `s0`, `s1`, ...
    pub fn from_tabular<Sites, Samples>(sites: Sites) -> EvalResult<Self>
    where
        Sites: IntoIterator<Item = (String, Samples)>,
        Samples: IntoIterator<Item = RawCall>,
    {
        let mut builder = GenotypeArrayBuilder::default();
        for (id, samples) in sites {
            builder.add_variant(id, samples)?;
        }
        Ok(builder.build())
    }

    /// Build an array from reader records, in stream order.
    pub fn from_records<'r>(
        sample_ids: impl IntoIterator<Item = impl Into<String>>,
        records: impl IntoIterator<Item = &'r VariantRecord>,
    ) -> EvalResult<Self> {
        let mut builder = Self::builder(sample_ids);
        for record in records {
            builder.add_record(record)?;
        }
        Ok(builder.build())
    }

    pub fn num_variants(&self) -> usize {
        self.variant_ids.len()
    }

    pub fn num_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// `(variants, samples)`
    pub fn shape(&self) -> (usize, usize) {
        (self.num_variants(), self.num_samples())
    }

    pub fn is_empty(&self) -> bool {
        self.variant_ids.is_empty()
    }

    pub fn variant_ids(&self) -> &[String] {
        &self.variant_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// The call at a `(variant, sample)` cell, or [`None`] if either index is out of range.
    pub fn get(&self, variant: usize, sample: usize) -> Option<GenotypeCall> {
        if sample >= self.num_samples() {
            return None;
        }
        self.calls.get(variant * self.num_samples() + sample).copied()
    }

    /// One allele slot (0 or 1) of a cell.
    pub fn allele(&self, variant: usize, sample: usize, slot: usize) -> Option<AlleleCode> {
        self.get(variant, sample)
            .and_then(|call| call.alleles().get(slot).copied())
    }

    /// The calls of one variant across all samples.
    pub fn row(&self, variant: usize) -> Option<VariantRow<'_>> {
        let n = self.num_samples();
        let id = self.variant_ids.get(variant)?;
        Some(VariantRow {
            id,
            calls: &self.calls[variant * n..(variant + 1) * n],
        })
    }

    pub fn iter(&self) -> VariantRowsIter<'_> {
        VariantRowsIter {
            inner: self,
            next_row_ind: (0, self.num_variants()),
        }
    }
}

/// Accumulates validated rows into a [`GenotypeArray`].
///
/// Both error paths of [`Self::add_variant`] leave the builder untouched.
#[derive(Debug, Default)]
pub struct GenotypeArrayBuilder {
    sample_ids: Option<Vec<String>>,
    num_samples: Option<usize>,
    calls: Vec<GenotypeCall>,
    variant_ids: Vec<String>,
    // reused between rows
    buf_row: Vec<GenotypeCall>,
}

impl GenotypeArrayBuilder {
    /// Append one variant.
    ///
    /// # Errors
    /// - [`EvalError::MalformedRecord`] if any allele code is outside `-1..=1`.
    /// - [`EvalError::DimensionMismatch`] if the number of calls differs from the
    ///   named samples, or from the first variant added.
    pub fn add_variant<Samples>(&mut self, id: impl Into<String>, samples: Samples) -> EvalResult<()>
    where
        Samples: IntoIterator<Item = RawCall>,
    {
        let id = id.into();
        self.buf_row.clear();
        for raw in samples {
            let call = GenotypeCall::try_from(raw.alleles).map_err(|bad| {
                EvalError::malformed(&id, format!("allele code {bad} outside of -1..=1"))
            })?;
            self.buf_row.push(call);
        }

        let expected = self
            .num_samples
            .or_else(|| self.sample_ids.as_ref().map(Vec::len));
        if let Some(expected) = expected {
            if self.buf_row.len() != expected {
                return Err(EvalError::DimensionMismatch(format!(
                    "variant {id} has {} samples, expected {expected}",
                    self.buf_row.len()
                )));
            }
        }

        self.num_samples = Some(self.buf_row.len());
        self.calls.extend_from_slice(&self.buf_row);
        self.variant_ids.push(id);
        Ok(())
    }

    pub fn add_record(&mut self, record: &VariantRecord) -> EvalResult<()> {
        self.add_variant(record.key(), record.calls.iter().copied())
    }

    /// The number of variants added so far.
    pub fn len(&self) -> usize {
        self.variant_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variant_ids.is_empty()
    }

    pub fn build(self) -> GenotypeArray {
        let sample_ids = self.sample_ids.unwrap_or_else(|| {
            (0..self.num_samples.unwrap_or(0))
                .map(|i| format!("s{i}"))
                .collect()
        });
        GenotypeArray {
            calls: self.calls,
            variant_ids: self.variant_ids,
            sample_ids,
        }
    }
}

#[cfg(test)]
fn make_small_array() -> GenotypeArray {
    GenotypeArray::from_tabular(vec![
        (String::from("rs1"), vec![RawCall::unphased(0, 0), RawCall::unphased(0, 1)]),
        (String::from("rs2"), vec![RawCall::phased(1, 1), RawCall::MISSING]),
        (String::from("rs3"), vec![RawCall::unphased(-1, 1), RawCall::unphased(1, 0)]),
    ])
    .unwrap()
}

#[test]
fn test_build_preserves_stream_order() {
    let array = make_small_array();
    assert_eq!(array.shape(), (3, 2));
    assert_eq!(array.variant_ids(), &["rs1", "rs2", "rs3"]);
    assert_eq!(array.sample_ids(), &["s0", "s1"]);
    assert_eq!(array.get(1, 0), Some(GenotypeCall::HOM_ALT));
    assert_eq!(array.get(1, 1), Some(GenotypeCall::MISSING));
    assert_eq!(array.allele(2, 0, 0), Some(AlleleCode::Missing));
    assert_eq!(array.allele(2, 0, 1), Some(AlleleCode::Alt));
}

#[test]
fn test_out_of_range_access() {
    let array = make_small_array();
    assert_eq!(array.get(3, 0), None);
    assert_eq!(array.get(0, 2), None);
    assert_eq!(array.allele(0, 0, 2), None);
    assert!(array.row(3).is_none());
}

#[test]
fn test_differing_sample_counts_are_rejected() {
    let mut builder = GenotypeArrayBuilder::default();
    builder
        .add_variant("rs1", vec![RawCall::unphased(0, 0), RawCall::unphased(0, 1)])
        .unwrap();
    let err = builder
        .add_variant("rs2", vec![RawCall::unphased(0, 0)])
        .unwrap_err();
    assert!(matches!(err, EvalError::DimensionMismatch(_)));
    // failed rows are not recorded
    assert_eq!(builder.len(), 1);
}

#[test]
fn test_named_samples_fix_cardinality() {
    let mut builder = GenotypeArray::builder(["HG00096", "HG00097", "HG00099"]);
    let err = builder
        .add_variant("rs1", vec![RawCall::unphased(0, 0), RawCall::unphased(0, 1)])
        .unwrap_err();
    assert!(matches!(err, EvalError::DimensionMismatch(_)));
    assert!(builder.is_empty());
}

#[test]
fn test_malformed_allele_code() {
    let err = GenotypeArray::from_tabular(vec![(
        String::from("rs1"),
        vec![RawCall::unphased(0, 2)],
    )])
    .unwrap_err();
    assert!(matches!(err, EvalError::MalformedRecord { .. }));
}

#[test]
fn test_empty_array() {
    let array = GenotypeArray::from_tabular(Vec::<(String, Vec<RawCall>)>::new()).unwrap();
    assert!(array.is_empty());
    assert_eq!(array.shape(), (0, 0));
    assert_eq!(array.iter().count(), 0);
}
