use crate::{EvalError, EvalResult, GenotypeCall};

/// Allele codes for one sample as handed over by a reader, before validation.
///
/// `-1` is a missing allele; anything outside `-1..=1` is rejected when the call
/// is converted into a [`GenotypeCall`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawCall {
    pub alleles: [i32; 2],
    pub phased: bool,
}

impl RawCall {
    pub const MISSING: Self = Self::unphased(-1, -1);

    pub const fn unphased(a: i32, b: i32) -> Self {
        Self {
            alleles: [a, b],
            phased: false,
        }
    }

    pub const fn phased(a: i32, b: i32) -> Self {
        Self {
            alleles: [a, b],
            phased: true,
        }
    }
}

impl From<[i32; 2]> for RawCall {
    fn from(alleles: [i32; 2]) -> Self {
        Self {
            alleles,
            phased: false,
        }
    }
}

/// One variant line as exposed by the external reader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub position: usize,
    /// `None` when the ID column is `.`
    pub id: Option<String>,
    pub reference: String,
    pub alternate: String,
    pub quality: Option<f32>,
    /// `None` when the FILTER column is `.`
    pub filter: Option<String>,
    /// INFO key-value pairs in file order; flags carry no value.
    pub info: Vec<(String, Option<String>)>,
    pub calls: Vec<RawCall>,
}

impl VariantRecord {
    /// The identifier used to key rows: the ID column, or `chrom:pos` when it is absent.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}:{}", self.chrom, self.position),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.calls.len()
    }

    pub fn info_value(&self, key: &str) -> Option<&str> {
        self.info
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Validate every call of this record.
    pub fn genotype_calls(&self) -> impl Iterator<Item = EvalResult<GenotypeCall>> + '_ {
        self.calls.iter().map(|raw| {
            GenotypeCall::try_from(raw.alleles).map_err(|bad| {
                EvalError::malformed(self.key(), format!("allele code {bad} outside of -1..=1"))
            })
        })
    }

    /// Render the INFO column, `.` when there are no entries.
    pub fn info_field(&self) -> String {
        if self.info.is_empty() {
            return String::from(".");
        }
        self.info
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Split a raw INFO column into key-value pairs.
pub fn parse_info_field(raw: &str) -> Vec<(String, Option<String>)> {
    if raw.is_empty() || raw == "." {
        return Vec::new();
    }
    raw.split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((k, v)) => (String::from(k), Some(String::from(v))),
            None => (String::from(entry), None),
        })
        .collect()
}

#[test]
fn test_key_falls_back_to_position() {
    let record = VariantRecord {
        chrom: String::from("20"),
        position: 60343,
        ..Default::default()
    };
    assert_eq!(record.key(), "20:60343");

    let record = VariantRecord {
        id: Some(String::from("rs527639301")),
        ..record
    };
    assert_eq!(record.key(), "rs527639301");
}

#[test]
fn test_info_round_trip() {
    let info = parse_info_field("AC=1;AF=0.000199681;DB;NS=2504");
    assert_eq!(info.len(), 4);
    assert_eq!(info[2], (String::from("DB"), None));

    let record = VariantRecord {
        info,
        ..Default::default()
    };
    assert_eq!(record.info_value("AF"), Some("0.000199681"));
    assert_eq!(record.info_value("DB"), None);
    assert_eq!(record.info_field(), "AC=1;AF=0.000199681;DB;NS=2504");
    assert!(parse_info_field(".").is_empty());
}

#[test]
fn test_genotype_calls_reject_multiallelic_codes() {
    let record = VariantRecord {
        id: Some(String::from("rs1")),
        calls: vec![RawCall::unphased(0, 1), RawCall::unphased(2, 0)],
        ..Default::default()
    };
    let calls = record.genotype_calls().collect::<Vec<_>>();
    assert!(calls[0].is_ok());
    assert!(matches!(
        calls[1],
        Err(EvalError::MalformedRecord { ref variant, .. }) if variant == "rs1"
    ));
}
