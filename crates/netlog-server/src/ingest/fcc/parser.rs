// ULS pipe-delimited record parser
//
// Layouts (0-based field index):
//
// AM: 0 tag | 1 system id | 2 file number | 3 EBF number | 4 call sign |
//     5 operator class | 6 group code | 7 region code | 8 trustee call sign |
//     9 trustee indicator | 10 physician certification | 11 VE signature |
//     12 systematic call sign change | 13 vanity call sign change |
//     14 vanity relationship | 15 previous call sign |
//     16 previous operator class | 17 trustee name
//
// EN: 0 tag | 1 system id | 2 file number | 3 EBF number | 4 call sign |
//     5 entity type | 6 licensee id | 7 entity name | 8 first name | 9 MI |
//     10 last name | 11 suffix | 12 phone | 13 fax | 14 email |
//     15 street address | 16 city | 17 state | 18 zip code | 19 PO box |
//     20 attention line | 21 SGIN | 22 FRN | 23 applicant type code |
//     24 applicant type other | 25 status code | 26 status date

use chrono::NaiveDate;
use netlog_common::callsign;
use std::fmt::Debug;
use std::hash::Hash;

use super::models::{EntityRecord, LicenseRecord, Phase};

/// Field index of the call sign in every ULS record type
const CALL_SIGN_FIELD: usize = 4;

/// Source date format for EN status dates
const STATUS_DATE_FORMAT: &str = "%m/%d/%Y";

/// A record type the pipeline knows how to lift out of a ULS line
pub trait UlsRecord: Sized + Send + Sync + 'static {
    /// Record-type tag at field 0
    const TAG: &'static str;
    const PHASE: Phase;
    /// Lines with fewer fields than this are dropped
    const MIN_FIELDS: usize;

    type Key: Eq + Hash + Debug;

    /// Build a record from the split line. `call_sign` is already normalised.
    fn from_fields(call_sign: String, fields: &[&str]) -> Self;

    /// Natural key used for dedup and for the ON CONFLICT target
    fn natural_key(&self) -> Self::Key;
}

/// Whether field 0 of `line` is `R`'s tag, regardless of whether the rest parses
pub fn matches_tag<R: UlsRecord>(line: &str) -> bool {
    line.split('|').next().map(str::trim) == Some(R::TAG)
}

/// Parse one source line into a record of type `R`.
///
/// Returns `None` (never an error) when the tag does not match, the line is
/// short, or the call sign is blank.
pub fn parse_line<R: UlsRecord>(line: &str) -> Option<R> {
    let fields: Vec<&str> = line.split('|').collect();

    if !matches_tag::<R>(line) || fields.len() < R::MIN_FIELDS {
        return None;
    }

    let call_sign = callsign::normalize(fields[CALL_SIGN_FIELD])?;
    Some(R::from_fields(call_sign, &fields))
}

/// Trimmed field at `index`; absent or blank fields are `None`
fn field(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parse a `MM/DD/YYYY` date, yielding `None` for anything unparseable
pub fn parse_status_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, STATUS_DATE_FORMAT).ok()
}

impl UlsRecord for LicenseRecord {
    const TAG: &'static str = "AM";
    const PHASE: Phase = Phase::Amateur;
    const MIN_FIELDS: usize = 18;

    type Key = String;

    fn from_fields(call_sign: String, fields: &[&str]) -> Self {
        Self {
            call_sign,
            operator_class: field(fields, 5),
            group_code: field(fields, 6),
            region_code: field(fields, 7),
            trustee_call_sign: field(fields, 8),
            trustee_indicator: field(fields, 9),
            physician_certification: field(fields, 10),
            ve_signature: field(fields, 11),
            systematic_call_sign_change: field(fields, 12),
            vanity_call_sign_change: field(fields, 13),
            vanity_relationship: field(fields, 14),
            previous_call_sign: field(fields, 15),
            previous_operator_class: field(fields, 16),
            trustee_name: field(fields, 17),
        }
    }

    fn natural_key(&self) -> String {
        self.call_sign.clone()
    }
}

impl UlsRecord for EntityRecord {
    const TAG: &'static str = "EN";
    const PHASE: Phase = Phase::Entity;
    const MIN_FIELDS: usize = 23;

    type Key = (String, Option<String>, Option<String>);

    fn from_fields(call_sign: String, fields: &[&str]) -> Self {
        Self {
            call_sign,
            entity_type: field(fields, 5),
            licensee_id: field(fields, 6),
            entity_name: field(fields, 7),
            first_name: field(fields, 8),
            mi: field(fields, 9),
            last_name: field(fields, 10),
            suffix: field(fields, 11),
            phone: field(fields, 12),
            fax: field(fields, 13),
            email: field(fields, 14),
            street_address: field(fields, 15),
            city: field(fields, 16),
            state: field(fields, 17),
            zip_code: field(fields, 18),
            po_box: field(fields, 19),
            attention_line: field(fields, 20),
            sgin: field(fields, 21),
            frn: field(fields, 22),
            applicant_type_code: field(fields, 23),
            applicant_type_other: field(fields, 24),
            status_code: field(fields, 25),
            status_date: parse_status_date(fields.get(26).copied()),
        }
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.call_sign.clone(),
            self.licensee_id.clone(),
            self.entity_type.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AM_LINE: &str = "AM|4301121|0001234567|| w1aw |E|D|1|||||N|N||K1ABC|G|";
    const EN_LINE: &str = "EN|4301121|0001234567||W1AW|L|L00123456|ARRL Inc||||||||\
                           225 Main St|Newington|CT|06111||||0001234567|C||A|01/15/2024";

    #[test]
    fn test_parse_amateur_line() {
        let record: LicenseRecord = parse_line(AM_LINE).unwrap();

        assert_eq!(record.call_sign, "W1AW");
        assert_eq!(record.operator_class.as_deref(), Some("E"));
        assert_eq!(record.group_code.as_deref(), Some("D"));
        assert_eq!(record.trustee_call_sign, None);
        assert_eq!(record.previous_call_sign.as_deref(), Some("K1ABC"));
        assert_eq!(record.previous_operator_class.as_deref(), Some("G"));
        assert_eq!(record.trustee_name, None);
    }

    #[test]
    fn test_parse_entity_line() {
        let record: EntityRecord = parse_line(EN_LINE).unwrap();

        assert_eq!(record.call_sign, "W1AW");
        assert_eq!(record.entity_type.as_deref(), Some("L"));
        assert_eq!(record.licensee_id.as_deref(), Some("L00123456"));
        assert_eq!(record.entity_name.as_deref(), Some("ARRL Inc"));
        assert_eq!(record.city.as_deref(), Some("Newington"));
        assert_eq!(record.frn.as_deref(), Some("0001234567"));
        assert_eq!(record.status_code.as_deref(), Some("A"));
        assert_eq!(
            record.status_date,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_wrong_tag_is_skipped() {
        assert!(parse_line::<EntityRecord>(AM_LINE).is_none());
        assert!(parse_line::<LicenseRecord>(EN_LINE).is_none());
        assert!(parse_line::<LicenseRecord>("HD|1|2|3|W1AW|A|||||||||||||").is_none());
    }

    #[test]
    fn test_matches_tag_ignores_line_shape() {
        assert!(matches_tag::<LicenseRecord>(AM_LINE));
        assert!(matches_tag::<LicenseRecord>("AM|short"));
        assert!(matches_tag::<LicenseRecord>(" AM |1|2|3|   |E"));
        assert!(!matches_tag::<LicenseRecord>("AMX|1"));
        assert!(!matches_tag::<EntityRecord>(AM_LINE));
        assert!(!matches_tag::<LicenseRecord>(""));
    }

    #[test]
    fn test_short_line_is_dropped() {
        assert!(parse_line::<LicenseRecord>("AM|1|2|3|W1AW|E").is_none());
        assert!(parse_line::<EntityRecord>("EN|1|2|3|W1AW|L|L1|Name").is_none());
        assert!(parse_line::<LicenseRecord>("").is_none());
    }

    #[test]
    fn test_blank_call_sign_is_skipped() {
        assert!(parse_line::<LicenseRecord>("AM|1|2|3|   |E||||||||||||").is_none());
    }

    #[test]
    fn test_entity_without_trailing_fields() {
        // 23 fields: everything after FRN is absent
        let line = "EN|1|2|3|K2XYZ|L|L1||||||||||||||||0009";
        let record: EntityRecord = parse_line(line).unwrap();

        assert_eq!(record.frn.as_deref(), Some("0009"));
        assert_eq!(record.applicant_type_code, None);
        assert_eq!(record.status_date, None);
    }

    #[test]
    fn test_status_date_parsing() {
        assert_eq!(
            parse_status_date(Some("01/15/2024")),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(parse_status_date(Some("")), None);
        assert_eq!(parse_status_date(Some("N/A")), None);
        assert_eq!(parse_status_date(Some("13/45/2024")), None);
        assert_eq!(parse_status_date(None), None);
    }

    #[test]
    fn test_entity_natural_key() {
        let record: EntityRecord = parse_line(EN_LINE).unwrap();
        assert_eq!(
            record.natural_key(),
            (
                "W1AW".to_string(),
                Some("L00123456".to_string()),
                Some("L".to_string())
            )
        );
    }
}
