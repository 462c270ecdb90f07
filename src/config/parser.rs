use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use trawl::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Delay: {}ms", config.crawler.delay_ms);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Reads a newline-separated list file
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn read_list_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Validation(format!("Failed to read list file {}: {}", path.display(), e))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
workers = 10
delay-ms = 1000
user-agent = "TestCrawler/1.0"

[seeds]
urls = ["https://example.com/"]

[filters]
exclude = ["\\.pdf$"]

[headers]
Accept-Language = "en-us"

[output]
database-path = "./test.db"
print = false
"#;

        let file = create_temp_file(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.workers, Some(10));
        assert_eq!(config.crawler.delay_ms, 1000);
        assert_eq!(config.crawler.user_agent, "TestCrawler/1.0");
        assert_eq!(config.seeds.urls.len(), 1);
        assert_eq!(config.filters.exclude.len(), 1);
        assert_eq!(config.headers["Accept-Language"], "en-us");
        assert_eq!(config.output.database_path.as_deref(), Some("./test.db"));
        assert!(!config.output.print);
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse_config(
            r#"
[seeds]
urls = ["https://example.com/"]
"#,
        )
        .unwrap();

        assert_eq!(config.crawler.workers, None);
        assert_eq!(config.crawler.delay_ms, 0);
        assert_eq!(config.crawler.queue_capacity, 65_535);
        assert_eq!(config.crawler.pacing_capacity, 2048);
        assert!(config.headers.is_empty());
        assert!(config.output.print);
        assert!(config.output.database_path.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_file("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
workers = 0

[seeds]
urls = ["https://example.com/"]
"#;

        let file = create_temp_file(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_read_list_file() {
        let file = create_temp_file("https://a.test/\n\n  https://b.test/  \n# comment\n");
        let list = read_list_file(file.path()).unwrap();
        assert_eq!(list, vec!["https://a.test/", "https://b.test/"]);
    }

    #[test]
    fn test_read_missing_list_file() {
        let result = read_list_file(Path::new("/nonexistent/seeds.txt"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
