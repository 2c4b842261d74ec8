//! JWT 페이로드 디코딩 (서명 검증 없음)

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// 패딩 유무와 관계없이 받는 base64url 엔진
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `exp` 문자열에 허용하는 포맷
const EXPIRY_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"];

/// JWT 오류
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Malformed token: expected 3 dot-separated segments")]
    Malformed,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token has no 'exp' claim")]
    MissingExpiry,

    #[error("Invalid 'exp' claim: {0}")]
    InvalidExpiry(String),
}

/// 토큰 페이로드(claims)를 JSON으로 디코딩
pub fn decode_jwt_token(token: &str) -> Result<Value, JwtError> {
    let mut segments = token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(JwtError::Malformed),
    };

    let bytes = URL_SAFE_LENIENT.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `exp` 클레임을 UTC 시각으로 변환
///
/// 숫자(epoch 초)와 오프셋이 있는 ISO-8601 문자열 모두 허용.
pub fn decode_jwt_token_expiry(token: &str) -> Result<DateTime<Utc>, JwtError> {
    let claims = decode_jwt_token(token)?;
    match claims.get("exp") {
        None | Some(Value::Null) => Err(JwtError::MissingExpiry),
        Some(Value::Number(n)) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| JwtError::InvalidExpiry(n.to_string()))?;
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| JwtError::InvalidExpiry(n.to_string()))
        }
        Some(Value::String(s)) => parse_expiry(s),
        Some(other) => Err(JwtError::InvalidExpiry(other.to_string())),
    }
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, JwtError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| JwtError::InvalidExpiry(raw.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    EXPIRY_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| JwtError::InvalidExpiry(raw.to_string()))
}
