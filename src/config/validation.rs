use crate::config::types::{Config, CrawlerConfig, CredentialsConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_credentials(&config.credentials)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.seed_id.is_empty() {
        return Err(ConfigError::Validation(
            "seed_id cannot be empty".to_string(),
        ));
    }

    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page_size must be >= 1, got {}",
            config.page_size
        )));
    }

    if config.rate_limit_min_ms > config.rate_limit_max_ms {
        return Err(ConfigError::Validation(format!(
            "rate_limit_min_ms ({}) must not exceed rate_limit_max_ms ({})",
            config.rate_limit_min_ms, config.rate_limit_max_ms
        )));
    }

    Ok(())
}

/// Validates the target site URL templates
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    Url::parse(&config.login_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid login_url: {}", e)))?;

    if !config.contacts_url_template.contains("{id}") {
        return Err(ConfigError::Validation(
            "contacts_url_template must contain an {id} placeholder".to_string(),
        ));
    }

    if !config.collection_url_template.contains("{id}")
        || !config.collection_url_template.contains("{start}")
    {
        return Err(ConfigError::Validation(
            "collection_url_template must contain {id} and {start} placeholders".to_string(),
        ));
    }

    // The expanded templates must themselves be valid URLs
    let sample = config.contacts_url_template.replace("{id}", "probe");
    Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contacts_url_template: {}", e)))?;

    let sample = config
        .collection_url_template
        .replace("{id}", "probe")
        .replace("{start}", "0");
    Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid collection_url_template: {}", e)))?;

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates login credentials
fn validate_credentials(config: &CredentialsConfig) -> Result<(), ConfigError> {
    if config.email.is_empty() || !config.email.contains('@') {
        return Err(ConfigError::Validation(format!(
            "credentials email '{}' is not a valid address",
            config.email
        )));
    }

    if config.password.is_empty() {
        return Err(ConfigError::Validation(
            "credentials password cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.results_path.is_empty() {
        return Err(ConfigError::Validation(
            "results_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
