use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use prodcat_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// (dotted key, environment variables that can set it, in lookup order)
const FIELD_ENV_KEYS: &[(&str, &[&str])] = &[
    ("database.url", &["PRODCAT_DATABASE_URL", "DATABASE_URL"]),
    ("database.max_connections", &["PRODCAT_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["PRODCAT_DATABASE_TIMEOUT_SECS"]),
    ("server.bind_address", &["PRODCAT_SERVER_BIND_ADDRESS"]),
    ("server.port", &["PRODCAT_SERVER_PORT", "PORT"]),
    ("server.graceful_shutdown_secs", &["PRODCAT_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("transport.mode", &["PRODCAT_TRANSPORT_MODE"]),
    ("transport.rpc_endpoints", &["PRODCAT_RPC_ENDPOINTS", "RPC_ENDPOINTS"]),
    ("logging.level", &["PRODCAT_LOGGING_LEVEL", "PRODCAT_LOG_LEVEL"]),
    ("logging.format", &["PRODCAT_LOGGING_FORMAT", "PRODCAT_LOG_FORMAT"]),
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_keys) in FIELD_ENV_KEYS {
        lines.push(render_line(
            key,
            &field_value(&config, key),
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn field_value(config: &AppConfig, key: &str) -> String {
    match key {
        "database.url" => redact_url(&config.database.url),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "server.graceful_shutdown_secs" => config.server.graceful_shutdown_secs.to_string(),
        "transport.mode" => format!("{:?}", config.transport.mode).to_ascii_lowercase(),
        "transport.rpc_endpoints" => config.transport.rpc_endpoints.join(","),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format).to_ascii_lowercase(),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("prodcat.toml"), PathBuf::from("config/prodcat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Hides `user:password@` credentials if a URL carries them.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_url};

    #[test]
    fn redact_url_hides_credentials_only() {
        assert_eq!(redact_url("sqlite://catalog.db"), "sqlite://catalog.db");
        assert_eq!(redact_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(redact_url("sqlite://admin:pw@host/db"), "sqlite://***@host/db");
    }

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: toml::Value = "[server]\nport = 4000\n".parse().expect("toml");

        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
