//! Loading [`GameConfig`] from a TOML file.
//!
//! A missing or unreadable file is not fatal: the server logs the problem and
//! runs with defaults.

use std::path::Path;

use jobfair_core::GameConfig;

use crate::error::ServerError;

/// Parse a TOML document.
///
/// # Errors
///
/// `ServerError::Config` if the document is not valid TOML or a field has the
/// wrong type. Unknown tables and keys are ignored.
pub fn parse(text: &str) -> Result<GameConfig, ServerError> {
    toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
}

/// Load the configuration at `path`, falling back to defaults.
pub fn load(path: &Path) -> GameConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "config not readable, using defaults");
            return GameConfig::default();
        },
    };

    match parse(&text) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "config loaded");
            config
        },
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "config invalid, using defaults");
            GameConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(
            r#"
            [times]
            improv_round_duration_seconds = 60

            [lobby]
            code = "4242"
            "#,
        )
        .unwrap();

        assert_eq!(config.times.improv_round_duration_seconds, 60);
        assert_eq!(config.times.interception_time_added_seconds, 30);
        assert_eq!(config.lobby.code.as_deref(), Some("4242"));
        assert_eq!(config.limits.minimum_number_of_players, 3);
        assert_eq!(config.connection.outbound_queue_capacity, 256);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let result = parse("[limits]\nminimum_number_of_players = \"three\"\n");

        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nenforce_minimum_players = true").unwrap();

        let config = load(file.path());

        assert_eq!(config.required_players(), Some(3));
    }

    #[test]
    fn load_falls_back_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let config = load(&dir.path().join("absent.toml"));

        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn load_falls_back_on_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        assert_eq!(load(file.path()), GameConfig::default());
    }
}
