//! Fail-fast validation of a decoded charts configuration

use crate::config::ChartsConfiguration;
use crate::constraint::VersionConstraint;
use crate::error::ValidationError;

/// The only supported configuration API version
pub const API_VERSION: &str = "v1";

/// Checks a configuration and reports the first violation found
pub struct Validator;

impl Validator {
    pub fn validate(config: &ChartsConfiguration) -> Result<(), ValidationError> {
        let api_version = config.api_version.trim();
        if api_version.is_empty() {
            return Err(ValidationError::MissingApiVersion);
        }
        if api_version != API_VERSION {
            return Err(ValidationError::UnsupportedApiVersion {
                found: api_version.to_string(),
            });
        }

        if config.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if config.namespace.trim().is_empty() {
            return Err(ValidationError::MissingNamespace);
        }

        if config.charts.is_empty() {
            return Err(ValidationError::NoCharts);
        }

        for (idx, chart) in config.charts.iter().enumerate() {
            if chart.location.trim().is_empty() {
                return Err(ValidationError::EmptyChartLocation { position: idx + 1 });
            }

            if let Some(constraint) = &chart.constraint {
                VersionConstraint::parse(constraint).map_err(|e| {
                    ValidationError::InvalidVersionConstraint {
                        location: chart.location.clone(),
                        constraint: constraint.clone(),
                        reason: e.reason,
                    }
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChartDeclaration, decode};
    use crate::error::ValidationErrorKind;
    use crate::values::Values;

    fn valid() -> ChartsConfiguration {
        decode(
            "test",
            "apiVersion: v1\nname: demo\nnamespace: apps\ncharts:\n  stable/redis:~>1.0:\n",
        )
        .unwrap()
    }

    fn kind(config: &ChartsConfiguration) -> ValidationErrorKind {
        Validator::validate(config).unwrap_err().kind()
    }

    #[test]
    fn test_valid_config() {
        assert!(Validator::validate(&valid()).is_ok());
    }

    #[test]
    fn test_missing_api_version() {
        let config = decode("test", "name: demo\nnamespace: apps\ncharts:\n  ./a:\n").unwrap();
        assert_eq!(kind(&config), ValidationErrorKind::MissingApiVersion);
    }

    #[test]
    fn test_unsupported_api_version() {
        let mut config = valid();
        config.api_version = "v2".to_string();
        assert_eq!(kind(&config), ValidationErrorKind::UnsupportedApiVersion);
    }

    #[test]
    fn test_no_charts() {
        let config = decode("test", "apiVersion: v1\nname: demo\nnamespace: apps\ncharts: []\n")
            .unwrap();
        assert_eq!(kind(&config), ValidationErrorKind::NoCharts);
    }

    #[test]
    fn test_checks_run_in_order() {
        let mut config = valid();
        config.name.clear();
        config.namespace.clear();
        config.charts.clear();
        assert_eq!(kind(&config), ValidationErrorKind::MissingName);

        config.name = "demo".to_string();
        assert_eq!(kind(&config), ValidationErrorKind::MissingNamespace);
    }

    #[test]
    fn test_empty_location_reports_position() {
        let mut config = valid();
        config
            .charts
            .push(ChartDeclaration::from_key("  ", Values::new()));

        assert_eq!(
            Validator::validate(&config),
            Err(ValidationError::EmptyChartLocation { position: 2 })
        );
    }

    #[test]
    fn test_invalid_constraint() {
        let mut config = valid();
        config.charts[0].constraint = Some(">=banana".to_string());

        match Validator::validate(&config) {
            Err(ValidationError::InvalidVersionConstraint {
                location,
                constraint,
                ..
            }) => {
                assert_eq!(location, "stable/redis");
                assert_eq!(constraint, ">=banana");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_pessimistic_constraint_is_rejected() {
        let config = decode(
            "test",
            "apiVersion: v1\nname: demo\nnamespace: apps\ncharts:\n  stable/web:~>18446744073709551615:\n",
        )
        .unwrap();
        assert_eq!(kind(&config), ValidationErrorKind::InvalidVersionConstraint);
    }
}
