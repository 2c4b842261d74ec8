//! ong-utils Error Types
//!
//! 크레이트 전역 에러 타입 정의

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::HttpError;
use crate::jwt::JwtError;
use crate::storage::StorageError;
use crate::timers::TimerError;

/// ong-utils 에러
#[derive(Error, Debug)]
pub enum OngError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("JWT error: {0}")]
    Jwt(#[from] JwtError),
}

impl OngError {
    /// 로그/호출자용 고정 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            OngError::Storage(StorageError::Decoding(_)) => "DECODING_ERROR",
            OngError::Storage(StorageError::MissingChunk { .. }) => "MISSING_CHUNK",
            OngError::Storage(_) => "SECURE_STORE_ERROR",
            OngError::Config(ConfigError::MissingKey { .. }) => "CONFIG_MISSING_KEY",
            OngError::Config(ConfigError::AlreadyDefined { .. }) => "CONFIG_ALREADY_DEFINED",
            OngError::Config(_) => "CONFIG_ERROR",
            OngError::Timer(_) => "TIMER_NOT_STARTED",
            OngError::Http(_) => "HTTP_ERROR",
            OngError::Jwt(_) => "JWT_ERROR",
        }
    }
}

/// 크레이트 결과 타입
pub type Result<T> = std::result::Result<T, OngError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InternalStorage, MemoryStore};
    use crate::timers::OngTimer;

    #[test]
    fn test_codes_follow_variant() {
        let err: OngError = StorageError::Decoding("bad base64".to_string()).into();
        assert_eq!(err.code(), "DECODING_ERROR");

        let err: OngError = StorageError::InvalidChunkSize.into();
        assert_eq!(err.code(), "SECURE_STORE_ERROR");

        let err: OngError = TimerError::NotStarted("loop".to_string()).into();
        assert_eq!(err.code(), "TIMER_NOT_STARTED");
        assert!(err.to_string().contains("loop"));
    }

    fn stored_token(
        storage: &InternalStorage<MemoryStore>,
        timer: &mut OngTimer,
    ) -> Result<String> {
        timer.tic("read");
        let token = storage.get_value::<String>("token")?.unwrap_or_default();
        timer.toc("read")?;
        Ok(token)
    }

    #[test]
    fn test_module_errors_convert_with_question_mark() {
        let storage = InternalStorage::new(MemoryStore::new("TestErrors"));
        storage.store_value("token", "abc").unwrap();
        assert_eq!(stored_token(&storage, &mut OngTimer::new(true)).unwrap(), "abc");

        storage.store_value_raw("token", "{not a header").unwrap();
        let err = stored_token(&storage, &mut OngTimer::new(true)).unwrap_err();
        assert_eq!(err.code(), "DECODING_ERROR");
    }
}
