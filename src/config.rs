//! 설정 로더
//!
//! `~/.config/ongpi/{app_name}.{yaml|yml|json|js}`에서 설정을 읽습니다.
//! `ONG_CONFIG_PATH` 환경 변수(또는 `.env`)로 디렉토리나 파일 경로를 바꿀 수 있습니다.
//!
//! 파일 구조:
//! ```yaml
//! my_app:
//!   server: https://example.com
//!   service: my_service
//!   user: ongpi
//! log:
//!   level: debug
//! ```

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::storage::{InternalStorage, KeyringStore, SecretStore, StorageError};

/// 설정 경로 override 환경 변수
pub const CONFIG_PATH_ENV: &str = "ONG_CONFIG_PATH";

/// 홈 디렉토리 기준 기본 설정 디렉토리
const CONFIG_DIR: &str = ".config/ongpi";

/// 탐색 순서대로의 확장자
const EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "js"];

const LOG_SECTION: &str = "log";
const DEFAULT_LOG_LEVEL: &str = "info";

/// 설정 오류
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config file format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Key '{key}' not found in config section '{app}'")]
    MissingKey { app: String, key: String },

    #[error("Key '{key}' is already defined with a different value")]
    AlreadyDefined { key: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to render config: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") | Some("js") => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn parse(self, path: &Path, text: &str) -> Result<Map<String, Value>, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let parsed: Result<Value, String> = match self {
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        };
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match parsed.map_err(parse_error)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            _ => Err(parse_error("top-level value must be a mapping".to_string())),
        }
    }

    fn render(self, data: &Map<String, Value>) -> Result<String, ConfigError> {
        let rendered = match self {
            ConfigFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        };
        rendered.map_err(ConfigError::Render)
    }
}

/// 설정 파일 경로 결정
///
/// - `override_path`가 지원 확장자를 가지면 그 파일 자체
/// - 아니면 디렉토리로 보고 그 안에서 `{app_name}.{ext}` 탐색
/// - 어느 파일도 없으면 `{app_name}.yaml`
pub fn resolve_config_path(
    app_name: &str,
    override_path: Option<&Path>,
    home_dir: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    let dir = match override_path {
        Some(path) if ConfigFormat::from_path(path).is_ok() => return Ok(path.to_path_buf()),
        Some(path) => path.to_path_buf(),
        None => home_dir.ok_or(ConfigError::HomeDirNotFound)?.join(CONFIG_DIR),
    };

    let existing = EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", app_name, ext)))
        .find(|candidate| candidate.exists());

    Ok(existing.unwrap_or_else(|| dir.join(format!("{}.{}", app_name, EXTENSIONS[0]))))
}

/// `ONG_CONFIG_PATH` 값 정리 (공백뿐이면 무시)
fn config_path_override(raw: Option<String>) -> Option<PathBuf> {
    raw.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 앱 설정
#[derive(Debug, Clone)]
pub struct OngConfig {
    app_name: String,
    config_filename: PathBuf,
    format: ConfigFormat,
    data: Map<String, Value>,
}

impl OngConfig {
    /// 기본 위치(또는 `ONG_CONFIG_PATH`)에서 설정 로드
    pub fn new(app_name: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env(app_name)
    }

    /// 지정한 `.env` 파일을 먼저 읽은 뒤 `new`와 같은 방식으로 로드
    pub fn with_dotenv(
        app_name: &str,
        dotenv_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let dotenv_path = dotenv_path.as_ref();
        if let Err(e) = dotenvy::from_path(dotenv_path) {
            debug!(path = %dotenv_path.display(), error = %e, ".env not loaded");
        }
        Self::from_env(app_name)
    }

    fn from_env(app_name: &str) -> Result<Self, ConfigError> {
        let override_path = config_path_override(env::var(CONFIG_PATH_ENV).ok());
        let home = dirs::home_dir();
        let path = resolve_config_path(app_name, override_path.as_deref(), home.as_deref())?;

        Self::from_path(app_name, path)
    }

    /// 지정한 파일에서 설정 로드 (없으면 빈 설정, 첫 쓰기 때 생성)
    pub fn from_path(app_name: &str, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let format = ConfigFormat::from_path(&path)?;

        let data = if path.exists() {
            let text = fs::read_to_string(&path)?;
            format.parse(&path, &text)?
        } else {
            debug!(path = %path.display(), "config file not found, starting empty");
            Map::new()
        };

        match data.get(app_name) {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(Value::Array(items)) if items.is_empty() => {}
            Some(_) => {
                return Err(ConfigError::Parse {
                    path,
                    message: format!("section '{}' must be a mapping", app_name),
                })
            }
        }

        info!(app = app_name, path = %path.display(), "config loaded");
        Ok(Self {
            app_name: app_name.to_string(),
            config_filename: path,
            format,
            data,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn config_filename(&self) -> &Path {
        &self.config_filename
    }

    fn app_section(&self) -> Option<&Map<String, Value>> {
        self.data.get(&self.app_name).and_then(Value::as_object)
    }

    /// 앱 섹션의 값 조회 (없으면 `MissingKey`)
    pub fn config(&self, key: &str) -> Result<Value, ConfigError> {
        self.app_section()
            .and_then(|section| section.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::MissingKey {
                app: self.app_name.clone(),
                key: key.to_string(),
            })
    }

    /// 앱 섹션의 값 조회 (없으면 `default`)
    pub fn config_or(&self, key: &str, default: Value) -> Value {
        self.config(key).unwrap_or(default)
    }

    /// 앱 섹션의 값을 타입으로 변환해서 조회
    pub fn config_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        serde_json::from_value(self.config(key)?).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn config_str(&self, key: &str) -> Result<String, ConfigError> {
        match self.config(key)? {
            Value::String(value) => Ok(value),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a string, found {}", other),
            }),
        }
    }

    /// 앱 섹션에 새 키 추가 후 파일 저장
    ///
    /// 같은 값으로 다시 추가하면 no-op, 다른 값이면 `AlreadyDefined` (파일은 그대로).
    pub fn add_app_config<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ConfigError> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        if let Some(existing) = self.app_section().and_then(|section| section.get(key)) {
            if *existing == value {
                return Ok(());
            }
            return Err(ConfigError::AlreadyDefined {
                key: key.to_string(),
            });
        }

        let mut data = self.data.clone();
        let section = data
            .entry(self.app_name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        if let Value::Object(section) = section {
            section.insert(key.to_string(), value);
        }

        self.write(&data)?;
        self.data = data;
        info!(app = %self.app_name, key, "config value added");
        Ok(())
    }

    /// 임시 파일에 쓰고 rename
    fn write(&self, data: &Map<String, Value>) -> Result<(), ConfigError> {
        let text = self.format.render(data)?;
        if let Some(parent) = self.config_filename.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.config_filename.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.config_filename)?;
        Ok(())
    }

    /// `log.level` (기본 `info`)
    pub fn log_level(&self) -> String {
        self.data
            .get(LOG_SECTION)
            .and_then(|log| log.get("level"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    }

    /// 설정의 로그 레벨로 tracing subscriber 설치
    pub fn init_logging(&self) -> bool {
        init_logging(&self.log_level())
    }

    /// 앱 이름을 네임스페이스로 쓰는 내부 저장소
    pub fn internal_storage(&self) -> InternalStorage<KeyringStore> {
        InternalStorage::keyring(&self.app_name)
    }

    /// 설정에서 키링 (service, user) 이름 조회
    pub fn credential_names(
        &self,
        service_key: &str,
        username_key: &str,
    ) -> Result<(String, String), ConfigError> {
        Ok((self.config_str(service_key)?, self.config_str(username_key)?))
    }

    /// 설정에 적힌 service/user로 키링 비밀번호 조회
    pub fn get_password(
        &self,
        service_key: &str,
        username_key: &str,
    ) -> Result<Option<String>, ConfigError> {
        let (service, user) = self.credential_names(service_key, username_key)?;
        Ok(KeyringStore::new(service).get(&user)?)
    }

    /// 설정에 적힌 service/user로 키링 비밀번호 저장
    pub fn set_password(
        &self,
        service_key: &str,
        username_key: &str,
        password: &str,
    ) -> Result<(), ConfigError> {
        let (service, user) = self.credential_names(service_key, username_key)?;
        KeyringStore::new(service).set(&user, password)?;
        Ok(())
    }
}

/// stderr로 출력하는 tracing subscriber 설치
///
/// `RUST_LOG`가 있으면 그것을, 없으면 `level`을 사용. 이미 설치돼 있으면 `false`.
pub fn init_logging(level: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
