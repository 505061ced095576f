//! Per-call tags computed from allele codes alone, and their per-variant totals.

use crate::iter::VariantRow;
use crate::{AlleleCode, GenotypeArray, GenotypeCall};

/// `true` iff the call carries both a REF and an ALT allele.
pub fn is_heterozygous(call: GenotypeCall) -> bool {
    call.contains(AlleleCode::Ref) && call.contains(AlleleCode::Alt)
}

/// Number of missing alleles in the call: 2, 1 or 0.
///
/// A fully missing call is recognised by its allele-code sum of `-2`; a pair such
/// as `(-1, 1)` sums to 0 and counts a single missing allele.
pub fn missingness(call: GenotypeCall) -> u8 {
    if call.code_sum() == -2 {
        2
    } else if call.contains(AlleleCode::Missing) {
        1
    } else {
        0
    }
}

/// Number of ALT alleles carried by the call, missing alleles counting as zero.
pub fn minor_allele_weight(call: GenotypeCall) -> u8 {
    match call.count(AlleleCode::Alt) {
        2 => 2,
        1 => 1,
        _ => 0,
    }
}

/// Heterozygosity and missingness totals of one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDiagnostics {
    pub id: String,
    pub heterozygous: usize,
    pub missing_alleles: usize,
    pub num_samples: usize,
}

impl CallDiagnostics {
    pub fn from_row(row: VariantRow) -> Self {
        let calls = row.calls();
        Self {
            id: row.id().to_owned(),
            heterozygous: calls.iter().filter(|&&c| is_heterozygous(c)).count(),
            missing_alleles: calls.iter().map(|&c| missingness(c) as usize).sum(),
            num_samples: calls.len(),
        }
    }

    /// Fraction of all alleles at this variant that are missing; 0 with no samples.
    pub fn missing_rate(&self) -> f64 {
        if self.num_samples == 0 {
            return 0.0;
        }
        self.missing_alleles as f64 / (2 * self.num_samples) as f64
    }

    /// Fraction of samples called heterozygous; 0 with no samples.
    pub fn heterozygosity(&self) -> f64 {
        if self.num_samples == 0 {
            return 0.0;
        }
        self.heterozygous as f64 / self.num_samples as f64
    }
}

/// One [`CallDiagnostics`] per variant of `array`, in row order.
pub fn diagnose(array: &GenotypeArray) -> Vec<CallDiagnostics> {
    array.iter().map(CallDiagnostics::from_row).collect()
}

#[cfg(test)]
use crate::AlleleCode::{Alt, Missing, Ref};

#[test]
fn test_heterozygous() {
    assert!(is_heterozygous(GenotypeCall(Ref, Alt)));
    assert!(is_heterozygous(GenotypeCall(Alt, Ref)));
    assert!(!is_heterozygous(GenotypeCall(Alt, Alt)));
    assert!(!is_heterozygous(GenotypeCall(Missing, Alt)));
    assert!(!is_heterozygous(GenotypeCall::MISSING));
}

#[test]
fn test_missingness_uses_allele_sum() {
    assert_eq!(missingness(GenotypeCall::MISSING), 2);
    // sums to 0, a scalar equality test against -1 would misreport this pair
    assert_eq!(missingness(GenotypeCall(Missing, Alt)), 1);
    assert_eq!(missingness(GenotypeCall(Ref, Missing)), 1);
    assert_eq!(missingness(GenotypeCall(Ref, Alt)), 0);
    assert_eq!(missingness(GenotypeCall::HOM_REF), 0);
}

#[test]
fn test_minor_allele_weight() {
    assert_eq!(minor_allele_weight(GenotypeCall::HOM_ALT), 2);
    assert_eq!(minor_allele_weight(GenotypeCall(Alt, Ref)), 1);
    assert_eq!(minor_allele_weight(GenotypeCall(Missing, Alt)), 1);
    assert_eq!(minor_allele_weight(GenotypeCall::HOM_REF), 0);
    assert_eq!(minor_allele_weight(GenotypeCall::MISSING), 0);
    assert_eq!(minor_allele_weight(GenotypeCall(Ref, Missing)), 0);
}

#[test]
fn test_diagnose_array() {
    use crate::RawCall;

    let array = GenotypeArray::from_tabular(vec![
        (
            String::from("rs1"),
            vec![
                RawCall::unphased(0, 1),
                RawCall::unphased(1, 0),
                RawCall::MISSING,
                RawCall::unphased(-1, 1),
            ],
        ),
        (
            String::from("rs2"),
            vec![
                RawCall::unphased(0, 0),
                RawCall::unphased(0, 0),
                RawCall::unphased(1, 1),
                RawCall::unphased(0, 0),
            ],
        ),
    ])
    .unwrap();

    let diagnostics = diagnose(&array);
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].heterozygous, 2);
    assert_eq!(diagnostics[0].missing_alleles, 3);
    assert!((diagnostics[0].missing_rate() - 3.0 / 8.0).abs() < 1e-12);
    assert!((diagnostics[0].heterozygosity() - 0.5).abs() < 1e-12);
    assert_eq!(diagnostics[1].heterozygous, 0);
    assert_eq!(diagnostics[1].missing_alleles, 0);
    assert_eq!(diagnostics[1].missing_rate(), 0.0);
}
