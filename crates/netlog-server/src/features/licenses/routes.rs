//! Licence lookup routes
//!
//! - `GET /api/v1/fcc/licenses/:call_sign` - Amateur licence and entities for a call sign

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use netlog_common::callsign::CallSign;
use sqlx::PgPool;

use super::queries::{get_license, LicenseLookup};
use crate::error::AppError;

/// Create licence routes
pub fn licenses_routes() -> Router<PgPool> {
    Router::new().route("/licenses/:call_sign", get(get_license_by_call_sign))
}

/// GET /fcc/licenses/:call_sign
async fn get_license_by_call_sign(
    State(db): State<PgPool>,
    Path(call_sign): Path<String>,
) -> Result<Json<LicenseLookup>, AppError> {
    let call_sign = CallSign::parse(&call_sign)?;

    get_license(&db, &call_sign)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No FCC licence found for {}", call_sign)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unknown_call_sign_is_404(pool: PgPool) {
        let response = licenses_routes()
            .with_state(pool)
            .oneshot(Request::builder().uri("/licenses/W1AW").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_invalid_call_sign_is_400(pool: PgPool) {
        let response = licenses_routes()
            .with_state(pool)
            .oneshot(Request::builder().uri("/licenses/W1-AW").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_lookup_returns_license_and_entities(pool: PgPool) {
        sqlx::query("INSERT INTO fcc_amateur_licenses (call_sign, operator_class) VALUES ('W1AW', 'E')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO fcc_entities (call_sign, entity_type, entity_name) VALUES ('W1AW', 'L', 'ARRL')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let lookup = get_license(&pool, &CallSign::parse("w1aw").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(lookup.call_sign, "W1AW");
        assert_eq!(lookup.license.unwrap().operator_class.as_deref(), Some("E"));
        assert_eq!(lookup.entities.len(), 1);
        assert_eq!(lookup.entities[0].entity_type.as_deref(), Some("L"));
        assert_eq!(lookup.entities[0].licensee_id, None);
    }
}
