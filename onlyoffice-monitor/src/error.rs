/**
 * ERREURS DU MONITOR - Taxonomie commune probes / clients / API
 *
 * Connectivity : dépendance injoignable (MySQL down, Docker API fermée...)
 * Query        : dépendance joignable mais opération en échec
 * NotFound     : entité référencée absente (conteneur inconnu)
 * Validation   : requête entrante malformée (webhook)
 *
 * Les probes convertissent ces erreurs en ProbeResult; seules les routes
 * à la demande les transforment en réponse HTTP via IntoResponse.
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("connection failed: {0}")]
    Connectivity(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Validation(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::Validation(_) => StatusCode::BAD_REQUEST,
            MonitorError::Connectivity(_) | MonitorError::Query(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            MonitorError::Connectivity(e.to_string())
        } else {
            MonitorError::Query(e.to_string())
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => MonitorError::Connectivity(e.to_string()),
            other => MonitorError::Query(other.to_string()),
        }
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

/// Erreurs de chargement de la configuration (fatales au démarrage)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("CHECK_INTERVAL must be greater than zero")]
    ZeroInterval,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(MonitorError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(MonitorError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            MonitorError::Connectivity("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(MonitorError::Query("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message_is_bare() {
        let err = MonitorError::NotFound("Container not found".into());
        assert_eq!(err.to_string(), "Container not found");
    }
}
