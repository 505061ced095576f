#[cfg(feature = "noodles")]
pub mod vcf {
    use crate::{parse_info_field, EvalError, EvalResult, GenotypeArray, RawCall, VariantRecord};
    pub use noodles::vcf as noodles_vcf;
    use noodles::vcf::variant::record::samples::keys::key;
    use noodles::vcf::variant::record::samples::series::value::genotype::Phasing;
    use noodles::vcf::variant::record::samples::series::Value;
    use noodles::vcf::variant::record::samples::Sample;
    use noodles::vcf::variant::record::AlternateBases;
    use noodles::vcf::{Header, Record};
    use std::io::BufRead;
    use std::path::Path;

    fn vcf_error(e: std::io::Error) -> EvalError {
        EvalError::NoodlesVCF(e)
    }

    pub fn sample_ids(header: &Header) -> Vec<String> {
        header.sample_names().iter().cloned().collect()
    }

    /// Convert the GT field of every sample into a [`RawCall`].
    ///
    /// Absent or `.` genotypes become two missing alleles. Allele indices are passed
    /// through untouched, so a second ALT (index 2) is caught later as a malformed
    /// code. Calls that are neither diploid nor fully missing are rejected here.
    pub fn record_to_calls(header: &Header, record: &Record) -> EvalResult<Vec<RawCall>> {
        let num_samples = header.sample_names().len();
        let mut calls = Vec::with_capacity(num_samples);

        for sample in record.samples().iter() {
            let fetched_field = match sample
                // get the GT field
                .get(header, key::GENOTYPE)
                .transpose()
                .map_err(vcf_error)?
                .flatten()
            {
                // field or value missing
                None => {
                    calls.push(RawCall::MISSING);
                    continue;
                }
                Some(value) => value,
            };

            let Value::Genotype(genotype) = fetched_field else {
                return Err(EvalError::malformed(
                    record_label(record),
                    "GT field is not a genotype",
                ));
            };

            let mut alleles = Vec::with_capacity(2);
            let mut phased = false;
            for entry in genotype.iter() {
                let (position, phasing) = entry.map_err(vcf_error)?;
                phased |= phasing == Phasing::Phased;
                alleles.push(match position {
                    None => -1,
                    Some(i) => i32::try_from(i).unwrap_or(i32::MAX),
                });
            }

            let call = match alleles[..] {
                [a, b] => RawCall {
                    alleles: [a, b],
                    phased,
                },
                [-1] | [] => RawCall::MISSING,
                _ => {
                    return Err(EvalError::malformed(
                        record_label(record),
                        format!("expected a diploid call, got {} alleles", alleles.len()),
                    ))
                }
            };
            calls.push(call);
        }
        Ok(calls)
    }

    fn record_label(record: &Record) -> String {
        let ids = record.ids();
        let ids: &str = ids.as_ref();
        if ids.is_empty() || ids == "." {
            String::from(record.reference_sequence_name())
        } else {
            ids.to_owned()
        }
    }

    fn dot_to_none(raw: &str) -> Option<String> {
        match raw {
            "" | "." => None,
            other => Some(other.to_owned()),
        }
    }

    /// Lift a noodles record into the reader-agnostic [`VariantRecord`].
    pub fn record_to_variant(header: &Header, record: &Record) -> EvalResult<VariantRecord> {
        let position = match record.variant_start() {
            Some(start) => usize::from(start.map_err(vcf_error)?),
            None => 0,
        };
        let quality = record.quality_score().transpose().map_err(vcf_error)?;
        let alternate = record
            .alternate_bases()
            .iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(vcf_error)?
            .join(",");

        Ok(VariantRecord {
            chrom: record.reference_sequence_name().to_owned(),
            position,
            id: dot_to_none(record.ids().as_ref()),
            reference: AsRef::<str>::as_ref(&record.reference_bases()).to_owned(),
            alternate: if alternate.is_empty() {
                String::from(".")
            } else {
                alternate
            },
            quality,
            filter: dot_to_none(record.filters().as_ref()),
            info: parse_info_field(record.info().as_ref()),
            calls: record_to_calls(header, record)?,
        })
    }

    /// Owns a reader and yields its records as [`VariantRecord`]s.
    pub struct VariantStream<R> {
        reader: noodles_vcf::io::Reader<R>,
        header: Header,
        record: Record,
    }

    impl<R: BufRead> VariantStream<R> {
        /// Read the header of `reader` and position it on the first record.
        pub fn new(mut reader: noodles_vcf::io::Reader<R>) -> EvalResult<Self> {
            let header = reader.read_header().map_err(vcf_error)?;
            Ok(Self {
                reader,
                header,
                record: Record::default(),
            })
        }

        pub fn header(&self) -> &Header {
            &self.header
        }

        pub fn sample_ids(&self) -> Vec<String> {
            sample_ids(&self.header)
        }

        /// The header as text lines, ready for [`crate::likelihood::rewrite_header`].
        pub fn header_lines(&self) -> EvalResult<Vec<String>> {
            header_lines(&self.header)
        }
    }

    impl VariantStream<Box<dyn BufRead>> {
        /// Open a plain or bgzip-compressed file.
        pub fn open(path: impl AsRef<Path>) -> EvalResult<Self> {
            let reader = noodles_vcf::io::reader::Builder::default()
                .build_from_path(path)
                .map_err(vcf_error)?;
            Self::new(reader)
        }
    }

    impl<R: BufRead> Iterator for VariantStream<R> {
        type Item = EvalResult<VariantRecord>;

        fn next(&mut self) -> Option<Self::Item> {
            match self.reader.read_record(&mut self.record) {
                Ok(0) => None,
                Ok(_) => Some(record_to_variant(&self.header, &self.record)),
                Err(e) => Some(Err(vcf_error(e))),
            }
        }
    }

    /// Serialize `header` and split it into lines.
    pub fn header_lines(header: &Header) -> EvalResult<Vec<String>> {
        let mut writer = noodles_vcf::io::Writer::new(Vec::new());
        writer.write_header(header).map_err(vcf_error)?;
        let text = String::from_utf8_lossy(writer.get_ref()).into_owned();
        Ok(text.lines().map(String::from).collect())
    }

    /// Load a whole file into one [`GenotypeArray`].
    pub fn read_genotype_array(path: impl AsRef<Path>) -> EvalResult<GenotypeArray> {
        let mut stream = VariantStream::open(path)?;
        let mut builder = GenotypeArray::builder(stream.sample_ids());
        for record in stream.by_ref() {
            builder.add_record(&record?)?;
        }
        Ok(builder.build())
    }
}
