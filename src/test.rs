#[cfg(test)]
mod tests {
    use crate::aggregate::{summarize, summarize_axis, Axis};
    use crate::compare::{compare, discordance};
    use crate::frequency::{frequency_bin, DirectFrequency, FrequencySource};
    use crate::likelihood::{likelihood_for, LikelihoodVector};
    use crate::testdata::{perturb, random_array, random_array_rng, RandomArrayOptions, ALL_CALLS};
    use crate::{EvalError, GenotypeArray, RawCall};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn identical_datasets_have_no_discordance() {
        let truth = random_array(
            42,
            50,
            20,
            Some(RandomArrayOptions {
                missing_data_rate: Some(0.1),
                phased: true,
            }),
        );
        let matrix = compare(&truth, &truth.clone()).unwrap();
        assert!(matrix.scores().iter().all(|&s| s == 0.0));

        let summary = summarize(&matrix).unwrap();
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.rmse, 0.0);
    }

    #[test]
    fn flipping_one_cell_only_moves_that_cell() {
        let rows = |flip: bool| {
            vec![
                (String::from("rs1"), vec![RawCall::unphased(0, 0), RawCall::unphased(0, 1)]),
                (
                    String::from("rs2"),
                    vec![
                        if flip {
                            RawCall::unphased(1, 1)
                        } else {
                            RawCall::unphased(0, 0)
                        },
                        RawCall::unphased(1, 1),
                    ],
                ),
                (String::from("rs3"), vec![RawCall::unphased(1, 0), RawCall::unphased(0, 0)]),
            ]
        };
        let truth = GenotypeArray::from_tabular(rows(false)).unwrap();
        let same = GenotypeArray::from_tabular(rows(false)).unwrap();
        let flipped = GenotypeArray::from_tabular(rows(true)).unwrap();

        let before = compare(&truth, &same).unwrap();
        let after = compare(&truth, &flipped).unwrap();
        assert_eq!(summarize(&before).unwrap().rmse, 0.0);
        assert!(summarize(&after).unwrap().rmse > 0.0);

        for v in 0..3 {
            for s in 0..2 {
                let expected = if (v, s) == (1, 0) { 1.0 } else { 0.0 };
                assert_eq!(after.get(v, s), Some(expected));
            }
        }
    }

    #[test]
    fn perturbed_datasets_summarize_per_axis() {
        let mut rng = StdRng::seed_from_u64(7);
        let truth = random_array_rng(30, 12, None, &mut rng);
        let candidate = perturb(&truth, 0.3, &mut rng);
        let matrix = compare(&truth, &candidate).unwrap();

        let overall = summarize(&matrix).unwrap();
        let per_variant = summarize_axis(&matrix, Axis::Variant).unwrap();
        let per_sample = summarize_axis(&matrix, Axis::Sample).unwrap();
        assert_eq!(per_variant.mean.len(), 30);
        assert_eq!(per_sample.mean.len(), 12);

        // equal axis lengths make the mean of means the overall mean
        let mean_of_rows = per_variant.mean.iter().sum::<f64>() / 30.0;
        let mean_of_cols = per_sample.mean.iter().sum::<f64>() / 12.0;
        assert!((mean_of_rows - overall.mean).abs() < 1e-12);
        assert!((mean_of_cols - overall.mean).abs() < 1e-12);
        assert!(overall.rmse >= overall.mean);
    }

    #[test]
    fn mismatched_sample_counts_across_datasets() {
        let truth = random_array(1, 5, 4, None);
        let candidate = random_array(1, 5, 3, None);
        assert!(matches!(
            compare(&truth, &candidate),
            Err(EvalError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn likelihoods_sum_to_one_for_every_call() {
        for call in ALL_CALLS {
            let gl = likelihood_for(call, LikelihoodVector::UNIFORM).unwrap();
            assert!((gl.sum() - 1.0).abs() < 1e-12, "{call:?} -> {gl:?}");
            assert!(gl.components().iter().all(|&p| p >= 0.0));
            for (p, log) in gl.components().iter().zip(gl.log10_floored()) {
                if *p <= 1e-5 {
                    assert_eq!(log, -5.0);
                }
            }
        }
    }

    proptest!(
    #[test]
    fn discordance_is_symmetric_and_bounded(a in 0_usize..9, b in 0_usize..9) {
        let (a, b) = (ALL_CALLS[a], ALL_CALLS[b]);
        let ab = discordance(a, b);
        prop_assert_eq!(ab, discordance(b, a));
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert_eq!(ab == 0.0, a.code_sum() == b.code_sum());
    }
    );

    proptest!(
    #[test]
    fn comparison_of_random_arrays_is_symmetric(seed in 0..u64::MAX,
                                                num_variants in 1_usize..40,
                                                num_samples in 1_usize..30,
                                                rate in 0_f64..1.0) {
        let mut rng = StdRng::seed_from_u64(seed);
        let truth = random_array_rng(num_variants, num_samples, None, &mut rng);
        let candidate = perturb(&truth, rate, &mut rng);

        let forward = compare(&truth, &candidate).unwrap();
        let backward = compare(&candidate, &truth).unwrap();
        prop_assert_eq!(forward.scores(), backward.scores());
        prop_assert!(forward.scores().iter().all(|s| (0.0..=1.0).contains(s)));
    }
    );

    proptest!(
    #[test]
    fn frequencies_stay_in_unit_interval(seed in 0..u64::MAX,
                                         num_samples in 1_usize..50,
                                         missing_data_rate in 0_f64..1.0) {
        let array = random_array(
            seed,
            10,
            num_samples,
            Some(RandomArrayOptions { missing_data_rate: Some(missing_data_rate), phased: false }),
        );
        for record in DirectFrequency(&array).allele_frequencies().unwrap() {
            prop_assert!((0.0..=1.0).contains(&record.value));
            prop_assert_eq!(record.bin, frequency_bin(record.value));
        }
    }
    );

    proptest!(
    #[test]
    fn bins_are_monotone(a in -0.1_f64..1.0, b in -0.1_f64..1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(frequency_bin(lo) <= frequency_bin(hi));
    }
    );
}
