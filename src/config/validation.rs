use crate::config::types::{
    Config, CrawlerConfig, RulesKind, SpiderConfig, StorageConfig, UserAgentConfig,
};
use crate::crawler::builtin_rules_kind;
use crate::{ConfigError, ConfigResult};
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_spiders(&config.spiders)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_body_bytes must be >= 1".to_string(),
        ));
    }

    if config.file_types.is_empty() {
        return Err(ConfigError::Validation(
            "file_types must list at least one content type".to_string(),
        ));
    }

    for file_type in &config.file_types {
        if !file_type.contains('/') || file_type.starts_with("text/html") {
            return Err(ConfigError::Validation(format!(
                "'{}' is not a valid document content type",
                file_type
            )));
        }
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.blob_dir.is_empty() {
        return Err(ConfigError::Validation(
            "blob_dir cannot be empty".to_string(),
        ));
    }

    if config.export_page_size == 0 {
        return Err(ConfigError::Validation(
            "export_page_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_spiders(spiders: &[SpiderConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();

    for spider in spiders {
        validate_spider_name(&spider.name)?;

        if !seen.insert(spider.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "spider '{}' is declared more than once",
                spider.name
            )));
        }

        let builtin = builtin_rules_kind(&spider.name);
        let kind = match (builtin, spider.rules) {
            (Some(builtin), Some(requested)) if builtin != requested => {
                return Err(ConfigError::Validation(format!(
                    "spider '{}' is built in and cannot change its rules",
                    spider.name
                )));
            }
            (Some(builtin), _) => builtin,
            (None, Some(requested)) => requested,
            (None, None) => {
                return Err(ConfigError::Validation(format!(
                    "spider '{}' must declare its rules",
                    spider.name
                )));
            }
        };

        if builtin.is_none() && kind != RulesKind::Custom {
            return Err(ConfigError::Validation(format!(
                "spider '{}' must use custom rules; gov and who are reserved for built-in spiders",
                spider.name
            )));
        }

        if kind == RulesKind::Custom
            && spider.follow_selector.is_none()
            && spider.file_selector.is_none()
        {
            return Err(ConfigError::Validation(format!(
                "spider '{}' needs a follow-selector or a file-selector",
                spider.name
            )));
        }

        if builtin.is_none() && spider.seeds.is_empty() {
            return Err(ConfigError::Validation(format!(
                "spider '{}' must have at least one seed URL",
                spider.name
            )));
        }

        for seed in &spider.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "Seed URL '{}' must use HTTP(S)",
                    seed
                )));
            }
        }

        for selector in [
            &spider.follow_selector,
            &spider.file_selector,
            &spider.next_selector,
        ]
        .into_iter()
        .flatten()
        {
            validate_selector(selector)?;
        }
    }

    Ok(())
}

/// Spider names appear in URLs, so keep them to a safe alphabet
fn validate_spider_name(name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "spider name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "spider name must contain only ASCII letters, digits, '_' or '-', got '{}'",
            name
        )));
    }

    Ok(())
}

pub(crate) fn validate_selector(selector: &str) -> ConfigResult<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> ConfigResult<()> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
