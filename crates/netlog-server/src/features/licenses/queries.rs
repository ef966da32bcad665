//! Licence lookup queries

use serde::Serialize;
use sqlx::PgPool;

use crate::ingest::fcc::{EntityRecord, LicenseRecord};
use netlog_common::callsign::CallSign;

/// Everything imported for one call sign
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseLookup {
    pub call_sign: String,
    pub license: Option<LicenseRecord>,
    pub entities: Vec<EntityRecord>,
}

impl LicenseLookup {
    pub fn is_empty(&self) -> bool {
        self.license.is_none() && self.entities.is_empty()
    }
}

/// Fetch the amateur row and entity rows for `call_sign`.
///
/// Returns `None` when neither table has the call sign.
pub async fn get_license(db: &PgPool, call_sign: &CallSign) -> Result<Option<LicenseLookup>, sqlx::Error> {
    let license = sqlx::query_as::<_, LicenseRecord>(
        r#"
        SELECT call_sign, operator_class, group_code, region_code,
               trustee_call_sign, trustee_indicator, physician_certification,
               ve_signature, systematic_call_sign_change, vanity_call_sign_change,
               vanity_relationship, previous_call_sign, previous_operator_class,
               trustee_name
        FROM fcc_amateur_licenses
        WHERE call_sign = $1
        "#,
    )
    .bind(call_sign.as_str())
    .fetch_optional(db)
    .await?;

    // Absent key parts are stored as '' to keep the unique constraint total
    let entities = sqlx::query_as::<_, EntityRecord>(
        r#"
        SELECT call_sign,
               NULLIF(entity_type, '') AS entity_type,
               NULLIF(licensee_id, '') AS licensee_id,
               entity_name, first_name, mi, last_name, suffix, phone, fax, email,
               street_address, city, state, zip_code, po_box, attention_line,
               sgin, frn, applicant_type_code, applicant_type_other,
               status_code, status_date
        FROM fcc_entities
        WHERE call_sign = $1
        ORDER BY entity_type, licensee_id
        "#,
    )
    .bind(call_sign.as_str())
    .fetch_all(db)
    .await?;

    let lookup = LicenseLookup {
        call_sign: call_sign.to_string(),
        license,
        entities,
    };

    Ok((!lookup.is_empty()).then_some(lookup))
}
