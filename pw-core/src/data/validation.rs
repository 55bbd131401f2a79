//! Configuration validation
//!
//! Configuration problems are recorded at parse time and become fatal at
//! init; this module performs the init-time checks.

use pw_error::{PciewatchError, Result};
use regex::Regex;

use crate::data::config::{ParserConfig, PluginConfig};

/// Validate a plugin configuration before init proceeds
pub fn validate_config(config: &PluginConfig) -> Result<()> {
    if !config.device_polling_enabled() && !config.read_log {
        return Err(PciewatchError::config(
            "plugin is not configured for any source of data",
        ));
    }

    for parser in &config.parsers {
        validate_parser(parser)?;
    }

    Ok(())
}

fn validate_parser(parser: &ParserConfig) -> Result<()> {
    if parser.name.trim().is_empty() {
        return Err(PciewatchError::invalid_config(
            "MsgPattern",
            "parser name cannot be empty",
        ));
    }

    if parser.patterns.is_empty() {
        return Err(PciewatchError::invalid_config(
            "MsgPattern",
            format!("parser \"{}\" has no patterns", parser.name),
        ));
    }

    for pattern in &parser.patterns {
        if pattern.name.trim().is_empty() {
            return Err(PciewatchError::invalid_config(
                "Match",
                format!("parser \"{}\" has a pattern without a name", parser.name),
            ));
        }

        compile_checked(&pattern.regex)?;
        if let Some(exclude) = &pattern.excluderegex {
            compile_checked(exclude)?;
        }
    }

    Ok(())
}

fn compile_checked(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| PciewatchError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::config::{default_patterns, PatternConfig};

    fn parser(name: &str, patterns: Vec<PatternConfig>) -> ParserConfig {
        ParserConfig {
            name: name.to_string(),
            patterns,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&PluginConfig::default()).is_ok());
    }

    #[test]
    fn test_no_data_source_is_rejected() {
        let mut config = PluginConfig::default();
        config.source = "disabled".to_string();
        config.read_log = false;
        assert!(validate_config(&config).is_err());

        // Log reading alone is a valid data source
        config.read_log = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_parser_name_is_rejected() {
        let mut config = PluginConfig::default();
        config.parsers.push(parser("", default_patterns()));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_parser_without_patterns_is_rejected() {
        let mut config = PluginConfig::default();
        config.parsers.push(parser("empty", Vec::new()));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        let mut config = PluginConfig::default();
        let mut patterns = default_patterns();
        patterns[0].regex = "(unclosed".to_string();
        config.parsers.push(parser("broken", patterns));
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, PciewatchError::InvalidRegex { .. }));
    }

    #[test]
    fn test_bad_excluderegex_is_rejected() {
        let mut config = PluginConfig::default();
        let mut patterns = default_patterns();
        patterns[0].excluderegex = Some("[".to_string());
        config.parsers.push(parser("broken", patterns));
        assert!(validate_config(&config).is_err());
    }
}
