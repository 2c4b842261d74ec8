//! ong-utils - 공통 유틸리티 라이브러리
//!
//! - `storage`: OS 키링 위의 압축/청크 분할 키-값 저장소
//! - `config`: YAML/JSON 설정 로더 (로깅, 키링 연동)
//! - `timers`: tic/toc 경과 시간 측정
//! - `http`: 재시도 HTTP 클라이언트, 쿠키 헬퍼
//! - `jwt`: JWT 페이로드/만료 시각 디코딩

pub mod config;
pub mod error;
pub mod http;
pub mod jwt;
pub mod storage;
pub mod timers;
pub mod utils;

pub use config::{init_logging, OngConfig};
pub use error::{OngError, Result};
pub use http::{cookies_to_header, create_pool_manager, get_cookies, HttpPool, RetryPolicy};
pub use jwt::{decode_jwt_token, decode_jwt_token_expiry};
pub use storage::{InternalStorage, KeyringStore, MemoryStore, SecretStore, StoredFormat};
pub use timers::OngTimer;
pub use utils::{is_debugging, local_now, Platform};
