//! Human-friendly reference codes for notes and reports.
//!
//! The alphabet drops characters that are easy to confuse when read aloud
//! or copied by hand (vowels, `0/O`, `1/I/L`, `5/S`, `8/B`).

use chrono::NaiveDate;
use rand::Rng;

pub const REFERENCE_CODE_ALPHABET: &[u8] = b"CDFGHJKMNPQRTVWXYZ234679";

/// Length of note codes.
pub const NOTE_CODE_LENGTH: usize = 9;

/// Length of the random suffix of report codes (`YYYYMMDD-XXXXXXXX`).
pub const REPORT_CODE_SUFFIX_LENGTH: usize = 8;

/// Generates a random code of `length` characters from the reference alphabet.
pub fn generate_reference_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..REFERENCE_CODE_ALPHABET.len());
            char::from(REFERENCE_CODE_ALPHABET[idx])
        })
        .collect()
}

/// Generates a report code: compact date, a dash, then random characters.
pub fn generate_date_based_reference_code<R: Rng + ?Sized>(rng: &mut R, date: NaiveDate) -> String {
    format!(
        "{}-{}",
        date.format("%Y%m%d"),
        generate_reference_code(rng, REPORT_CODE_SUFFIX_LENGTH)
    )
}
