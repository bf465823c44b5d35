use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use concierge_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One reported setting: dotted key, rendered value and the env vars that can
/// set it, highest precedence first.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(settings(&config).into_iter().map(|setting| {
        let source = field_source(&setting, file_doc.as_ref(), file_path.as_deref());
        format!("- {} = {} (source: {source})", setting.key, setting.value)
    }));
    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let api_key = if config.llm.has_api_key() { "<redacted>" } else { "<unset>" };

    vec![
        Setting {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["CONCIERGE_DATABASE_URL"],
        },
        Setting {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["CONCIERGE_DATABASE_MAX_CONNECTIONS"],
        },
        Setting {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["CONCIERGE_DATABASE_TIMEOUT_SECS"],
        },
        Setting {
            key: "llm.api_key",
            value: api_key.to_string(),
            env_keys: &["CONCIERGE_LLM_API_KEY", "DEEPSEEK_API_KEY"],
        },
        Setting {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["CONCIERGE_LLM_BASE_URL"],
        },
        Setting {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["CONCIERGE_LLM_MODEL"],
        },
        Setting {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["CONCIERGE_LLM_TEMPERATURE"],
        },
        Setting {
            key: "llm.max_tokens",
            value: config.llm.max_tokens.to_string(),
            env_keys: &["CONCIERGE_LLM_MAX_TOKENS"],
        },
        Setting {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["CONCIERGE_LLM_TIMEOUT_SECS"],
        },
        Setting {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["CONCIERGE_SERVER_BIND_ADDRESS"],
        },
        Setting {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["CONCIERGE_SERVER_PORT"],
        },
        Setting {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Setting {
            key: "agent.max_tool_round_trips",
            value: config.agent.max_tool_round_trips.to_string(),
            env_keys: &["CONCIERGE_AGENT_MAX_TOOL_ROUND_TRIPS"],
        },
        Setting {
            key: "agent.side_effect_queue_capacity",
            value: config.agent.side_effect_queue_capacity.to_string(),
            env_keys: &["CONCIERGE_AGENT_SIDE_EFFECT_QUEUE_CAPACITY"],
        },
        Setting {
            key: "agent.memory_window",
            value: config.agent.memory_window.to_string(),
            env_keys: &["CONCIERGE_AGENT_MEMORY_WINDOW"],
        },
        Setting {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        },
        Setting {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(setting: &Setting, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = setting.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, setting.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
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
