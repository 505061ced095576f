/// One allele of a biallelic call, as stored in a [`crate::GenotypeArray`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(i8)]
pub enum AlleleCode {
    Missing = -1,
    Ref = 0,
    Alt = 1,
}

impl AlleleCode {
    pub fn as_raw(self) -> i8 {
        self as i8
    }

    pub fn is_missing(self) -> bool {
        self == AlleleCode::Missing
    }
}

impl TryFrom<i32> for AlleleCode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(AlleleCode::Missing),
            0 => Ok(AlleleCode::Ref),
            1 => Ok(AlleleCode::Alt),
            other => Err(other),
        }
    }
}

/// The pair of alleles observed for one sample at one variant.
///
/// Phase is carried by the reader but ignored here: every derived quantity
/// depends on the allele sum, never on slot order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct GenotypeCall(pub AlleleCode, pub AlleleCode);

impl GenotypeCall {
    pub const HOM_REF: Self = Self(AlleleCode::Ref, AlleleCode::Ref);
    pub const HET: Self = Self(AlleleCode::Ref, AlleleCode::Alt);
    pub const HOM_ALT: Self = Self(AlleleCode::Alt, AlleleCode::Alt);
    pub const MISSING: Self = Self(AlleleCode::Missing, AlleleCode::Missing);

    pub fn alleles(&self) -> [AlleleCode; 2] {
        [self.0, self.1]
    }

    /// Sum of the raw allele codes, in `-2..=2`.
    pub fn code_sum(&self) -> i8 {
        self.0.as_raw() + self.1.as_raw()
    }

    /// Number of ALT alleles in the call. Missing alleles contribute nothing.
    pub fn alt_count(&self) -> u8 {
        self.count(AlleleCode::Alt)
    }

    pub fn count(&self, code: AlleleCode) -> u8 {
        (self.0 == code) as u8 + (self.1 == code) as u8
    }

    pub fn contains(&self, code: AlleleCode) -> bool {
        self.0 == code || self.1 == code
    }
}

impl TryFrom<[i32; 2]> for GenotypeCall {
    type Error = i32;

    fn try_from([a, b]: [i32; 2]) -> Result<Self, Self::Error> {
        Ok(Self(AlleleCode::try_from(a)?, AlleleCode::try_from(b)?))
    }
}

impl From<(AlleleCode, AlleleCode)> for GenotypeCall {
    fn from((a, b): (AlleleCode, AlleleCode)) -> Self {
        Self(a, b)
    }
}

#[test]
fn test_codes_outside_range_are_rejected() {
    assert_eq!(AlleleCode::try_from(2), Err(2));
    assert_eq!(AlleleCode::try_from(-2), Err(-2));
    assert_eq!(GenotypeCall::try_from([0, 3]), Err(3));
}

#[test]
fn test_alt_count_ignores_order_and_missing() {
    assert_eq!(GenotypeCall(AlleleCode::Alt, AlleleCode::Ref).alt_count(), 1);
    assert_eq!(GenotypeCall(AlleleCode::Ref, AlleleCode::Alt).alt_count(), 1);
    assert_eq!(GenotypeCall::HOM_ALT.alt_count(), 2);
    assert_eq!(GenotypeCall::MISSING.alt_count(), 0);
    assert_eq!(GenotypeCall(AlleleCode::Missing, AlleleCode::Alt).alt_count(), 1);
}

#[test]
fn test_code_sum() {
    assert_eq!(GenotypeCall::MISSING.code_sum(), -2);
    assert_eq!(GenotypeCall(AlleleCode::Missing, AlleleCode::Alt).code_sum(), 0);
    assert_eq!(GenotypeCall::HOM_ALT.code_sum(), 2);
}
