//! 값 직렬화/압축 코덱
//!
//! 포맷: base64(snappy(json(value)))
//!
//! 압축을 청크 분할 전에 적용해서 청크 수를 최소화합니다.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroize;

use super::StorageError;

/// 값을 텍스트 안전한 압축 문자열로 변환
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    let mut plaintext = serde_json::to_vec(value)?;
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&plaintext)
        .map_err(|e| StorageError::Encoding(e.to_string()));
    plaintext.zeroize();
    Ok(BASE64.encode(compressed?))
}

/// `encode` 결과를 원래 값으로 복원
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, StorageError> {
    let compressed = BASE64
        .decode(text.trim())
        .map_err(|e| StorageError::Decoding(format!("invalid base64: {}", e)))?;
    let mut plaintext = snap::raw::Decoder::new()
        .decompress_vec(&compressed)
        .map_err(|e| StorageError::Decoding(format!("invalid snappy data: {}", e)))?;
    let value = serde_json::from_slice(&plaintext)
        .map_err(|e| StorageError::Decoding(format!("invalid payload: {}", e)));
    plaintext.zeroize();
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct OAuthToken {
        access_token: String,
        expires_in: u64,
        scopes: Vec<String>,
        refresh: Option<String>,
    }

    #[test]
    fn test_roundtrip_structured_values() {
        let values = vec![
            json!("This is a string"),
            json!({"this": "is", "a": "dictionary"}),
            json!(1245),
            json!([{"hola": 1, "adios": 2}, 3, ["holi"]]),
            json!(true),
            json!(null),
            json!(-12.5),
        ];
        for value in values {
            let encoded = encode(&value).unwrap();
            let decoded: Value = decode(&encoded).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_roundtrip_typed_struct() {
        let token = OAuthToken {
            access_token: "eyJhbGciOiJSUzI1NiJ9".to_string(),
            expires_in: 3600,
            scopes: vec!["read".to_string(), "write".to_string()],
            refresh: None,
        };
        let decoded: OAuthToken = decode(&encode(&token).unwrap()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_repetitive_text_compresses() {
        let long = "this is a long string".repeat(100);
        let encoded = encode(&long).unwrap();
        assert!(encoded.len() < long.len());
        assert!(encoded.len() < 1025, "Too long data");
    }

    #[test]
    fn test_encoded_text_is_base64() {
        let encoded = encode(&json!({"nested": {"map": [1, 2, 3]}})).unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
        assert!(!encoded.starts_with('{'));
    }

    #[test]
    fn test_corrupted_input_fails() {
        assert!(matches!(
            decode::<Value>("not base64 at all!"),
            Err(StorageError::Decoding(_))
        ));

        let encoded = encode(&"a".repeat(500)).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        // 잘린 base64는 길이가 맞지 않을 수 있으므로 4의 배수로 맞춤
        let truncated = &truncated[..truncated.len() / 4 * 4];
        assert!(matches!(
            decode::<Value>(truncated),
            Err(StorageError::Decoding(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_decoding_error() {
        let encoded = encode(&json!({"a": 1})).unwrap();
        assert!(matches!(
            decode::<Vec<u32>>(&encoded),
            Err(StorageError::Decoding(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_roundtrip_maps(
            map in proptest::collection::btree_map(".{0,12}", any::<i64>(), 0..16)
        ) {
            let encoded = encode(&map).unwrap();
            let decoded: BTreeMap<String, i64> = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, map);
        }

        #[test]
        fn prop_roundtrip_strings(text in ".{0,400}") {
            let decoded: String = decode(&encode(&text).unwrap()).unwrap();
            prop_assert_eq!(decoded, text);
        }
    }
}
