pub mod assessments;
pub mod health;
pub mod indicators;
pub mod maintenance;
pub mod positions;
pub mod signals;
pub mod summary;
pub mod webhook;

use crate::error::{AppError, Result};
use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(signals::router())
        .merge(positions::router())
        .merge(summary::router())
        .merge(assessments::router())
        .nest("/api/indicators", indicators::router())
        .nest("/api/maintenance", maintenance::router())
}

/// Apply a default and reject values outside `[min, max]`.
pub(crate) fn bounded(name: &str, value: Option<i64>, default: i64, min: i64, max: i64) -> Result<i64> {
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(AppError::BadRequest(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_defaults_and_limits() {
        assert_eq!(bounded("hours", None, 24, 1, 168).unwrap(), 24);
        assert_eq!(bounded("hours", Some(168), 24, 1, 168).unwrap(), 168);
        assert!(matches!(
            bounded("hours", Some(0), 24, 1, 168),
            Err(AppError::BadRequest(_))
        ));
        assert!(bounded("limit", Some(101), 20, 1, 100).is_err());
    }
}
