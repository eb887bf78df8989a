//! Concrete record types stored by AssayDB.
//!
//! Each record shape is an independent implementation of the
//! `assay_common::Record` capability set; there is no shared base type.

mod patient;

pub use patient::PatientRecord;
pub use pcr_test::PcrTestRecord;
