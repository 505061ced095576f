#![allow(dead_code)]

use crate::{AlleleCode, GenotypeArray, GenotypeCall, RawCall};
use rand::prelude::*;

#[derive(Clone, Default)]
pub struct RandomArrayOptions {
    pub(super) missing_data_rate: Option<f64>,
    pub(super) phased: bool,
}

// Draw one diploid call under Hardy-Weinberg proportions for
// the given ALT frequency, then blank out each allele with
// probability `missing_data_rate`.
fn random_call(rng: &mut StdRng, alt_frequency: f64, options: &RandomArrayOptions) -> RawCall {
    let mut draw = || {
        if let Some(rate) = options.missing_data_rate {
            if rng.random_bool(rate) {
                return -1;
            }
        }
        rng.random_bool(alt_frequency) as i32
    };
    let (a, b) = (draw(), draw());
    if options.phased {
        RawCall::phased(a, b)
    } else {
        RawCall::unphased(a, b)
    }
}

// Generate a random array with per-variant ALT frequencies
// drawn uniformly from [0, 0.5).
//
// Parameters
//
// * seed: random number seed
// * num_variants, num_samples: shape of the array
// * options: see RandomArrayOptions.
pub fn random_array(
    seed: u64,
    num_variants: usize,
    num_samples: usize,
    options: Option<RandomArrayOptions>,
) -> GenotypeArray {
    let mut rng = StdRng::seed_from_u64(seed);
    random_array_rng(num_variants, num_samples, options, &mut rng)
}

pub fn random_array_rng(
    num_variants: usize,
    num_samples: usize,
    options: Option<RandomArrayOptions>,
    rng: &mut StdRng,
) -> GenotypeArray {
    let options = options.unwrap_or_default();
    let mut builder = GenotypeArray::builder((0..num_samples).map(|i| format!("s{i}")));
    for variant in 0..num_variants {
        let alt_frequency = rng.random_range(0.0..0.5);
        let calls = (0..num_samples)
            .map(|_| random_call(rng, alt_frequency, &options))
            .collect::<Vec<_>>();
        builder.add_variant(format!("rs{variant}"), calls).unwrap();
    }
    builder.build()
}

// Copy of `array` where each call is replaced, with probability `rate`,
// by a uniformly drawn call. Mimics a lossy decode of the truth.
pub fn perturb(array: &GenotypeArray, rate: f64, rng: &mut StdRng) -> GenotypeArray {
    const CODES: [i32; 3] = [-1, 0, 1];
    let mut builder = GenotypeArray::builder(array.sample_ids().iter().cloned());
    for row in array.iter() {
        let calls = row
            .calls()
            .iter()
            .map(|call| {
                if rng.random_bool(rate) {
                    RawCall::unphased(
                        *CODES.choose(rng).unwrap(),
                        *CODES.choose(rng).unwrap(),
                    )
                } else {
                    raw(*call)
                }
            })
            .collect::<Vec<_>>();
        builder.add_variant(row.id(), calls).unwrap();
    }
    builder.build()
}

pub fn raw(call: GenotypeCall) -> RawCall {
    RawCall::unphased(call.0.as_raw() as i32, call.1.as_raw() as i32)
}

pub const ALL_CALLS: [GenotypeCall; 9] = {
    use AlleleCode::*;
    [
        GenotypeCall(Ref, Ref),
        GenotypeCall(Ref, Alt),
        GenotypeCall(Alt, Ref),
        GenotypeCall(Alt, Alt),
        GenotypeCall(Missing, Ref),
        GenotypeCall(Ref, Missing),
        GenotypeCall(Missing, Alt),
        GenotypeCall(Alt, Missing),
        GenotypeCall(Missing, Missing),
    ]
};
