use std::env;
use std::fs;
use std::path::Path;

use deplo_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key =
        if config.workload.api_key.expose_secret().is_empty() { "<unset>" } else { "<redacted>" };

    let fields = vec![
        field("queue.url", redact_url(config.queue.url.expose_secret()), &[
            "DEPLO_QUEUE_URL",
            "RABBITMQ_URL",
        ]),
        field("queue.name", &config.queue.name, &["DEPLO_QUEUE_NAME"]),
        field("queue.consumer_tag", &config.queue.consumer_tag, &["DEPLO_QUEUE_CONSUMER_TAG"]),
        field("queue.max_in_flight", config.queue.max_in_flight.to_string(), &[
            "DEPLO_QUEUE_MAX_IN_FLIGHT",
        ]),
        field("queue.serialize_per_agent", config.queue.serialize_per_agent.to_string(), &[
            "DEPLO_QUEUE_SERIALIZE_PER_AGENT",
        ]),
        field("queue.on_failure", format!("{:?}", config.queue.on_failure), &[
            "DEPLO_QUEUE_ON_FAILURE",
        ]),
        field("prompts.root", config.prompts.root.display().to_string(), &["DEPLO_PROMPTS_ROOT"]),
        field("workload.namespace", &config.workload.namespace, &[
            "DEPLO_WORKLOAD_NAMESPACE",
            "AGENTS_NAMESPACE",
        ]),
        field("workload.image", &config.workload.image, &["DEPLO_WORKLOAD_IMAGE"]),
        field("workload.container_name", &config.workload.container_name, &[
            "DEPLO_WORKLOAD_CONTAINER_NAME",
        ]),
        field("workload.port", config.workload.port.to_string(), &["DEPLO_WORKLOAD_PORT"]),
        field("workload.claim_name", &config.workload.claim_name, &["DEPLO_WORKLOAD_CLAIM_NAME"]),
        field("workload.volume_name", &config.workload.volume_name, &[
            "DEPLO_WORKLOAD_VOLUME_NAME",
        ]),
        field("workload.mount_path", &config.workload.mount_path, &["DEPLO_WORKLOAD_MOUNT_PATH"]),
        field("workload.base_path", &config.workload.base_path, &[
            "DEPLO_WORKLOAD_BASE_PATH",
            "BASE_PATH",
        ]),
        field("workload.secret_env_name", &config.workload.secret_env_name, &[
            "DEPLO_WORKLOAD_SECRET_ENV_NAME",
        ]),
        field("workload.api_key", api_key, &["DEPLO_WORKLOAD_API_KEY", "GOOGLE_API_KEY"]),
        field("server.bind_address", &config.server.bind_address, &[
            "DEPLO_SERVER_BIND_ADDRESS",
        ]),
        field("server.health_check_port", config.server.health_check_port.to_string(), &[
            "DEPLO_SERVER_HEALTH_CHECK_PORT",
        ]),
        field("logging.level", &config.logging.level, &[
            "DEPLO_LOGGING_LEVEL",
            "DEPLO_LOG_LEVEL",
        ]),
        field("logging.format", format!("{:?}", config.logging.format), &[
            "DEPLO_LOGGING_FORMAT",
            "DEPLO_LOG_FORMAT",
        ]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

struct ConfigField {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(
    key_path: &'static str,
    value: impl Into<String>,
    env_keys: &'static [&'static str],
) -> ConfigField {
    ConfigField { key_path, value: value.into(), env_keys }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

/// The first variable of `env_keys` with a non-blank value wins, matching the loader's alias
/// order; blank values are ignored by the loader too.
fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
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

fn env_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
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

/// Keeps scheme and host, hides any userinfo.
fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return "<redacted>".to_string();
    };

    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => format!("{scheme}://{rest}"),
    }
}
