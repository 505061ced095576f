use noodles::vcf;
use poolsnps::adapter::vcf::{read_genotype_array, VariantStream};
use poolsnps::classify::diagnose;
use poolsnps::config::EvaluationConfig;
use poolsnps::frequency::{DatasetSource, FrequencyStrategy};
use poolsnps::likelihood::{
    likelihood_format_line, rewrite_header, LikelihoodEncoderConfig, LikelihoodScale,
    LikelihoodWriter,
};
use poolsnps::pipeline::Evaluator;
use poolsnps::{EvalError, GenotypeCall, RawCall};

static TRUTH: &str = "##fileformat=VCFv4.3
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=20>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA1\tNA2\tNA3
20\t60343\trs527639301\tG\tA\t100\tPASS\tAF=0.25\tGT\t0|0\t0|1\t1/1
20\t60419\t.\tA\tG\t.\t.\tAF=0.5\tGT\t./.\t.|1\t0|.
20\t60479\trs149529999\tC\tT\t100\tPASS\tAF=0.01\tGT\t1|1\t0/0\t.
";

// NA3 at rs527639301 and NA2 at rs149529999 decoded wrongly,
// NA1 at 20:60419 called where the truth is missing.
static CANDIDATE: &str = "##fileformat=VCFv4.3
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=20>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA1\tNA2\tNA3
20\t60343\trs527639301\tG\tA\t.\t.\t.\tGT\t0|0\t0|1\t0/1
20\t60419\t.\tA\tG\t.\t.\t.\tGT\t0/0\t.|1\t0|.
20\t60479\trs149529999\tC\tT\t.\t.\t.\tGT\t1|1\t1/1\t.
";

fn stream(text: &'static str) -> VariantStream<&'static [u8]> {
    VariantStream::new(vcf::io::Reader::new(text.as_bytes())).unwrap()
}

#[test]
fn test_records_are_lifted() {
    let s = stream(TRUTH);
    assert_eq!(s.sample_ids(), ["NA1", "NA2", "NA3"]);

    let records = s.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].key(), "rs527639301");
    assert_eq!(records[0].position, 60343);
    assert_eq!(records[0].quality, Some(100.0));
    assert_eq!(records[0].filter.as_deref(), Some("PASS"));
    assert_eq!(records[0].info_value("AF"), Some("0.25"));
    assert_eq!(
        records[0].calls,
        [
            RawCall::phased(0, 0),
            RawCall::phased(0, 1),
            RawCall::unphased(1, 1)
        ]
    );

    assert_eq!(records[1].key(), "20:60419");
    assert_eq!(records[1].quality, None);
    assert_eq!(records[1].filter, None);
    assert_eq!(records[1].calls[0].alleles, [-1, -1]);
    assert_eq!(records[1].calls[1].alleles, [-1, 1]);
    assert_eq!(records[1].calls[2].alleles, [0, -1]);

    // a lone "." is a fully missing call
    assert_eq!(records[2].calls[2].alleles, [-1, -1]);
    let calls = records[2]
        .genotype_calls()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(calls[2], GenotypeCall::MISSING);
}

#[test]
fn test_haploid_call_is_malformed() {
    let text: &'static str = "##fileformat=VCFv4.3
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=Y>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts0\ts1
Y\t2655180\trsY1\tG\tA\t.\t.\t.\tGT\t0\t1
";
    let mut s = stream(text);
    match s.next() {
        Some(Err(EvalError::MalformedRecord { variant, .. })) => assert_eq!(variant, "rsY1"),
        other => panic!("expected a malformed record, got {other:?}"),
    }
}

#[test]
fn test_second_alt_rejected_when_building() {
    let text: &'static str = "##fileformat=VCFv4.3
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##contig=<ID=20>
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts0\ts1
20\t100\trs1\tG\tA,T\t.\t.\t.\tGT\t0/1\t1/2
";
    let mut s = stream(text);
    let record = s.next().unwrap().unwrap();
    assert_eq!(record.alternate, "A,T");

    let mut builder = poolsnps::GenotypeArray::builder(s.sample_ids());
    assert!(matches!(
        builder.add_record(&record),
        Err(EvalError::MalformedRecord { .. })
    ));
    assert!(builder.is_empty());
}

#[test]
fn test_chunked_discordance_over_vcf_streams() {
    let config = EvaluationConfig::new("pooled", 2).unwrap();
    let truth = stream(TRUTH);
    let candidate = stream(CANDIDATE);

    let mut out = Vec::new();
    let reports = Evaluator::new(&config, truth.sample_ids(), candidate.sample_ids())
        .run(truth, candidate, &mut out)
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].num_variants, 2);
    assert_eq!(reports[0].first_variant, "rs527639301");
    // a called genotype against a missing one is a full miss
    assert!((reports[0].summary.mean - 1.5 / 6.0).abs() < 1e-12);
    assert!((reports[1].summary.mean - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "ID\tNA1\tNA2\tNA3\n\
         rs527639301\t0\t0\t0.5\n\
         20:60419\t1\t0\t0\n\
         rs149529999\t0\t1\t0\n"
    );
}

#[test]
fn test_header_rewrite_from_noodles_header() {
    let s = stream(TRUTH);
    let lines = s.header_lines().unwrap();
    let rewritten = rewrite_header(lines.iter().map(String::as_str)).unwrap();

    assert!(rewritten.iter().all(|l| !l.starts_with("##FORMAT=<ID=GT")));
    let chrom = rewritten
        .iter()
        .position(|l| l.starts_with("#CHROM"))
        .unwrap();
    assert_eq!(rewritten[chrom - 1], likelihood_format_line());
    assert!(rewritten[chrom].ends_with("FORMAT\tNA1\tNA2\tNA3"));
    assert!(rewritten.iter().any(|l| l.starts_with("##INFO=<ID=AF")));
}

fn encode(scale: LikelihoodScale) -> Vec<String> {
    let s = stream(TRUTH);
    let header = s.header_lines().unwrap();
    let config = LikelihoodEncoderConfig::default().with_scale(scale);
    let mut writer = LikelihoodWriter::new(Vec::new(), config);
    writer
        .write_header(header.iter().map(String::as_str))
        .unwrap();
    for record in s {
        writer.write_record(&record.unwrap()).unwrap();
    }
    let text = String::from_utf8(writer.into_inner()).unwrap();
    text.lines()
        .filter(|l| !l.starts_with('#'))
        .map(String::from)
        .collect()
}

#[test]
fn test_encode_linear_likelihoods() {
    let third = (1.0f64 / 3.0).to_string();
    let lines = encode(LikelihoodScale::Linear);
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "20\t60343\trs527639301\tG\tA\t100\tPASS\tAF=0.25\tGL\t1,0,0\t0,1,0\t0,0,1"
    );
    assert_eq!(
        lines[1],
        format!("20\t60419\t.\tA\tG\t.\tPASS\tAF=0.5\tGL\t{third},{third},{third}\t0,0.5,0.5\t0.5,0.5,0")
    );
}

#[test]
fn test_encode_log10_likelihoods() {
    let lines = encode(LikelihoodScale::Log10);
    assert!(lines[0].ends_with("\tGL\t0,-5,-5\t-5,0,-5\t-5,-5,0"));
}

#[test]
fn test_frequencies_from_file_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truth.vcf");
    std::fs::write(&path, TRUTH).unwrap();

    let array = read_genotype_array(&path).unwrap();
    assert_eq!(array.shape(), (3, 3));
    let diagnostics = diagnose(&array);
    assert_eq!(diagnostics[0].heterozygous, 1);
    assert_eq!(diagnostics[1].missing_alleles, 4);

    let source = DatasetSource::Path(path);
    let direct = FrequencyStrategy::Direct.estimate(&source).unwrap();
    let values = direct.iter().map(|r| r.value).collect::<Vec<_>>();
    assert_eq!(values, [0.5, 1.0 / 6.0, 2.0 / 6.0]);
    assert!(direct.iter().all(|r| r.bin == 3));

    let info = FrequencyStrategy::InfoField {
        key: String::from("AF"),
    }
    .estimate(&source)
    .unwrap();
    assert_eq!(info.iter().map(|r| r.value).collect::<Vec<_>>(), [0.25, 0.5, 0.01]);
    assert_eq!(info[2].bin, 2);

    // the candidate file carries no AF annotation
    let bare = dir.path().join("candidate.vcf");
    std::fs::write(&bare, CANDIDATE).unwrap();
    assert!(matches!(
        FrequencyStrategy::InfoField {
            key: String::from("AF"),
        }
        .estimate(&DatasetSource::Path(bare)),
        Err(EvalError::MalformedRecord { .. })
    ));
}
