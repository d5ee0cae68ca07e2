//! Settings validation rules.

use super::schema::Settings;

/// Validate settings and return aggregated validation errors.
pub fn validate_settings(settings: &Settings) -> crate::Result<()> {
    let mut errors = Vec::new();

    if settings.session_settings.model.as_str().trim().is_empty() {
        errors.push("session_settings.model must not be empty".to_string());
    }
    if settings.api_base.trim().is_empty() {
        errors.push("api_base must not be empty".to_string());
    } else if !(settings.api_base.starts_with("http://")
        || settings.api_base.starts_with("https://"))
    {
        errors.push(format!(
            "api_base must be an http(s) URL, got '{}'",
            settings.api_base
        ));
    }
    if settings.data_dir.as_os_str().is_empty() {
        errors.push("data_dir must not be empty".to_string());
    }
    if let Some(behavior) = &settings.session_settings.behavior {
        if behavior.trim().is_empty() {
            errors.push("session_settings.behavior must not be blank when set".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

/// Fail fast when no API key is configured
pub fn require_api_key(settings: &Settings) -> crate::Result<&str> {
    settings.api_key().ok_or(crate::Error::MissingApiKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatModel;
    use std::path::PathBuf;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_settings(&Settings::default()).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut settings = Settings::default();
        settings.api_base = "ftp://example.com".to_string();
        settings.data_dir = PathBuf::new();
        settings.session_settings.model = ChatModel::Custom(" ".to_string());

        let err = validate_settings(&settings).unwrap_err().to_string();
        assert!(err.contains("api_base"));
        assert!(err.contains("data_dir"));
        assert!(err.contains("session_settings.model"));
    }

    #[test]
    fn test_require_api_key() {
        let mut settings = Settings::default();
        assert!(matches!(
            require_api_key(&settings),
            Err(crate::Error::MissingApiKey)
        ));

        settings.api_key = "  ".to_string();
        assert!(require_api_key(&settings).is_err());

        settings.api_key = "sk-test".to_string();
        assert_eq!(require_api_key(&settings).unwrap(), "sk-test");
    }
}
