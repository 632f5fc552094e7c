use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Output format of the `fmt` tracing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where published artifacts are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3 {
        bucket: String,
        prefix: String,
        endpoint_url: Option<String>,
    },
    Local {
        dir: PathBuf,
    },
}

/// Bot configuration loaded from environment variables.
#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Text that turns a channel message into a request (default `!generate `).
    pub command_prefix: String,
    pub enhance_prompt: bool,
    pub ollama_url: String,
    pub ollama_model: String,
    pub comfyui_url: String,
    pub checkpoint_name: String,
    pub nsfw_keywords_file: PathBuf,
    pub storage: StorageConfig,
    pub staging_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Per-call timeout of the shared HTTP client.
    pub http_timeout: Duration,
    pub serialize_per_user: bool,
    pub log_format: LogFormat,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("command_prefix", &self.command_prefix)
            .field("enhance_prompt", &self.enhance_prompt)
            .field("ollama_url", &self.ollama_url)
            .field("ollama_model", &self.ollama_model)
            .field("comfyui_url", &self.comfyui_url)
            .field("checkpoint_name", &self.checkpoint_name)
            .field("nsfw_keywords_file", &self.nsfw_keywords_file)
            .field("storage", &self.storage)
            .field("staging_dir", &self.staging_dir)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("http_timeout", &self.http_timeout)
            .field("serialize_per_user", &self.serialize_per_user)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default             |
    /// |------------------------|---------------------|
    /// | `DISCORD_BOT_TOKEN`    | required            |
    /// | `COMMAND_PREFIX`       | `!generate `        |
    /// | `ENHANCE_PROMPT`       | `false`             |
    /// | `OLLAMA_HOST`          | `localhost`         |
    /// | `OLLAMA_PORT`          | `11434`             |
    /// | `OLLAMA_MODEL`         | `llama3.1`          |
    /// | `COMFYUI_HOST`         | `localhost`         |
    /// | `COMFYUI_PORT`         | `8188`              |
    /// | `CHECKPOINT_NAME`      | `sd_v1.5.ckpt`      |
    /// | `NSFW_KEYWORDS_FILE`   | `nsfw_keywords.txt` |
    /// | `STORAGE_BACKEND`      | `s3`                |
    /// | `STORAGE_BUCKET`       | required for `s3`   |
    /// | `STORAGE_PREFIX`       | empty               |
    /// | `STORAGE_ENDPOINT_URL` | unset               |
    /// | `STORAGE_LOCAL_DIR`    | `./published`       |
    /// | `STAGING_DIR`          | `./images`          |
    /// | `POLL_INTERVAL_MS`     | `1000`              |
    /// | `POLL_TIMEOUT_SECS`    | `300`               |
    /// | `HTTP_TIMEOUT_SECS`    | `60`                |
    /// | `SERIALIZE_PER_USER`   | `false`             |
    /// | `LOG_FORMAT`           | `text`              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let discord_token = get("DISCORD_BOT_TOKEN").ok_or(ConfigError::Missing("DISCORD_BOT_TOKEN"))?;

        let ollama_port: u16 = parse(&get, "OLLAMA_PORT", 11434)?;
        let comfyui_port: u16 = parse(&get, "COMFYUI_PORT", 8188)?;

        let storage = match or("STORAGE_BACKEND", "s3").trim().to_ascii_lowercase().as_str() {
            "s3" => StorageConfig::S3 {
                bucket: get("STORAGE_BUCKET").ok_or(ConfigError::Missing("STORAGE_BUCKET"))?,
                prefix: or("STORAGE_PREFIX", ""),
                endpoint_url: get("STORAGE_ENDPOINT_URL"),
            },
            "local" => StorageConfig::Local {
                dir: PathBuf::from(or("STORAGE_LOCAL_DIR", "./published")),
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_BACKEND",
                    reason: format!("expected 's3' or 'local', got '{other}'"),
                })
            }
        };

        let log_format = match or("LOG_FORMAT", "text").trim().to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    reason: format!("expected 'text' or 'json', got '{other}'"),
                })
            }
        };

        let poll_interval_ms: u64 = parse(&get, "POLL_INTERVAL_MS", 1000)?;
        let poll_timeout_secs: u64 = parse(&get, "POLL_TIMEOUT_SECS", 300)?;
        let http_timeout_secs: u64 = parse(&get, "HTTP_TIMEOUT_SECS", 60)?;
        for (var, value) in [
            ("POLL_INTERVAL_MS", poll_interval_ms),
            ("POLL_TIMEOUT_SECS", poll_timeout_secs),
            ("HTTP_TIMEOUT_SECS", http_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(Self {
            discord_token,
            command_prefix: or("COMMAND_PREFIX", "!generate "),
            enhance_prompt: flag(&get, "ENHANCE_PROMPT"),
            ollama_url: format!("http://{}:{ollama_port}", or("OLLAMA_HOST", "localhost")),
            ollama_model: or("OLLAMA_MODEL", "llama3.1"),
            comfyui_url: format!("http://{}:{comfyui_port}", or("COMFYUI_HOST", "localhost")),
            checkpoint_name: or("CHECKPOINT_NAME", "sd_v1.5.ckpt"),
            nsfw_keywords_file: PathBuf::from(or("NSFW_KEYWORDS_FILE", "nsfw_keywords.txt")),
            storage,
            staging_dir: PathBuf::from(or("STAGING_DIR", "./images")),
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            serialize_per_user: flag(&get, "SERIALIZE_PER_USER"),
            log_format,
        })
    }
}

fn parse<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

/// `true` (any case) enables; anything else disables.
fn flag<G>(get: &G, var: &str) -> bool
where
    G: Fn(&str) -> Option<String>,
{
    get(var).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|name| map.get(name).cloned())
    }

    const BASE: [(&str, &str); 2] = [("DISCORD_BOT_TOKEN", "tok"), ("STORAGE_BUCKET", "images")];

    #[test]
    fn defaults_apply() {
        let config = load(&BASE).unwrap();
        assert_eq!(config.command_prefix, "!generate ");
        assert!(!config.enhance_prompt);
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3.1");
        assert_eq!(config.comfyui_url, "http://localhost:8188");
        assert_eq!(config.checkpoint_name, "sd_v1.5.ckpt");
        assert_eq!(config.nsfw_keywords_file, PathBuf::from("nsfw_keywords.txt"));
        assert_eq!(config.staging_dir, PathBuf::from("./images"));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.poll_timeout, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert!(!config.serialize_per_user);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(
            config.storage,
            StorageConfig::S3 {
                bucket: "images".into(),
                prefix: String::new(),
                endpoint_url: None,
            }
        );
    }

    #[test]
    fn token_is_required() {
        assert_matches!(
            load(&[("STORAGE_BUCKET", "images")]),
            Err(ConfigError::Missing("DISCORD_BOT_TOKEN"))
        );
        assert_matches!(
            load(&[("DISCORD_BOT_TOKEN", "  "), ("STORAGE_BUCKET", "images")]),
            Err(ConfigError::Missing("DISCORD_BOT_TOKEN"))
        );
    }

    #[test]
    fn s3_requires_bucket() {
        assert_matches!(
            load(&[("DISCORD_BOT_TOKEN", "tok")]),
            Err(ConfigError::Missing("STORAGE_BUCKET"))
        );
    }

    #[test]
    fn local_backend_needs_no_bucket() {
        let config = load(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("STORAGE_BACKEND", "Local"),
            ("STORAGE_LOCAL_DIR", "/srv/images"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                dir: PathBuf::from("/srv/images")
            }
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = BASE.to_vec();
        vars.extend([
            ("ENHANCE_PROMPT", "TRUE"),
            ("OLLAMA_HOST", "llm.internal"),
            ("OLLAMA_PORT", "8080"),
            ("COMFYUI_HOST", "gpu-01"),
            ("POLL_INTERVAL_MS", "250"),
            ("SERIALIZE_PER_USER", "true"),
            ("STORAGE_ENDPOINT_URL", "http://minio:9000"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = load(&vars).unwrap();
        assert!(config.enhance_prompt);
        assert_eq!(config.ollama_url, "http://llm.internal:8080");
        assert_eq!(config.comfyui_url, "http://gpu-01:8188");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(config.serialize_per_user);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_matches!(
            config.storage,
            StorageConfig::S3 { endpoint_url: Some(url), .. } if url == "http://minio:9000"
        );
    }

    #[test]
    fn enhance_flag_only_accepts_true() {
        let mut vars = BASE.to_vec();
        vars.push(("ENHANCE_PROMPT", "yes"));
        assert!(!load(&vars).unwrap().enhance_prompt);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("COMFYUI_PORT", "eighty"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "COMFYUI_PORT", .. }));

        let mut vars = BASE.to_vec();
        vars.push(("POLL_TIMEOUT_SECS", "0"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "POLL_TIMEOUT_SECS", .. }));

        let mut vars = BASE.to_vec();
        vars.push(("STORAGE_BACKEND", "gdrive"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "STORAGE_BACKEND", .. }));

        let mut vars = BASE.to_vec();
        vars.push(("LOG_FORMAT", "xml"));
        assert_matches!(load(&vars), Err(ConfigError::Invalid { var: "LOG_FORMAT", .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let config = load(&BASE).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("tok\""));
        assert!(rendered.contains("<redacted>"));
    }
}
