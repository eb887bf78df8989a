//! Patient record stored in the patient heap file.

use assay_common::text::{get_fixed_str, put_fixed_str};
use assay_common::{AssayError, Record, Result};

/// Maximum width of the given-name field in bytes.
pub const GIVEN_NAME_LEN: usize = 15;
/// Maximum width of the family-name field in bytes.
pub const FAMILY_NAME_LEN: usize = 14;
/// Width of the date field (`DD:MM:YYYY`).
pub const DATE_LEN: usize = 10;
/// Maximum width of the patient id field in bytes.
pub const ID_LEN: usize = 10;

/// A single patient. Every field has a fixed serialized width so the
/// record fits a fixed-size block slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatientRecord {
    given_name: String,
    family_name: String,
    date: String,
    id: String,
}

impl PatientRecord {
    /// Creates a patient record. Over-long fields are truncated on
    /// serialization.
    pub fn new(given_name: &str, family_name: &str, date: &str, id: &str) -> Self {
        Self {
            given_name: given_name.to_string(),
            family_name: family_name.to_string(),
            date: date.to_string(),
            id: id.to_string(),
        }
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Birth date in `DD:MM:YYYY` form.
    pub fn date(&self) -> &str {
        &self.date
    }
}

impl Record for PatientRecord {
    const SIZE: usize = (1 + GIVEN_NAME_LEN) + (1 + FAMILY_NAME_LEN) + (1 + DATE_LEN) + (1 + ID_LEN);

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        put_fixed_str(&mut buf, &self.given_name, GIVEN_NAME_LEN);
        put_fixed_str(&mut buf, &self.family_name, FAMILY_NAME_LEN);
        put_fixed_str(&mut buf, &self.date, DATE_LEN);
        put_fixed_str(&mut buf, &self.id, ID_LEN);
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != Self::SIZE {
            return Err(AssayError::RecordSizeMismatch {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        let mut buf = buf;
        Ok(Self {
            given_name: get_fixed_str(&mut buf, GIVEN_NAME_LEN),
            family_name: get_fixed_str(&mut buf, FAMILY_NAME_LEN),
            date: get_fixed_str(&mut buf, DATE_LEN),
            id: get_fixed_str(&mut buf, ID_LEN),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for PatientRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}) id={}",
            self.given_name, self.family_name, self.date, self.id
        )
    }
}
