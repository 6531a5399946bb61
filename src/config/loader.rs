use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use url::Url;

use super::ScoopConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["scoop.yaml", "config/scoop.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config value `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// 依次尝试显式路径与默认路径，均不存在时返回默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<ScoopConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            debug!(target: "config", path = %candidate.display(), "已加载配置文件");
            return Ok(config);
        }
    }

    debug!(target: "config", "未找到配置文件，使用默认配置");
    Ok(ScoopConfig::default())
}

/// 校验各服务地址均为 http(s) URL。
pub fn validate_config(config: &ScoopConfig) -> Result<(), ConfigError> {
    let endpoints = [
        ("global.rpc_url", config.global.rpc_url.as_str()),
        ("jupiter.quote_url", config.jupiter.quote_url.as_str()),
        ("jupiter.swap_url", config.jupiter.swap_url.as_str()),
        ("jupiter.catalog_url", config.jupiter.catalog_url.as_str()),
    ];
    for (field, raw) in endpoints {
        let url = Url::parse(raw.trim()).map_err(|err| ConfigError::Invalid {
            field,
            message: format!("{raw}: {err}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field,
                message: format!("不支持的协议 {}", url.scheme()),
            });
        }
    }
    Ok(())
}

fn try_load_file(path: &Path) -> Result<Option<ScoopConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: ScoopConfig =
        serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    Ok(Some(config))
}
