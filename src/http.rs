//! HTTP 클라이언트 팩토리 및 쿠키 헬퍼
//!
//! - 인증서 검증(rustls, webpki 루트)이 켜진 `reqwest::Client`
//! - 413/429/503 응답에 대한 재시도 + 지수 backoff (`Retry-After` 우선)
//!
//! urllib3 `Retry(status=N)`과 달리 `Retry-After` 헤더가 없어도 재시도하고,
//! 재시도를 모두 소진하면 오류 대신 마지막 응답을 반환합니다.
//! - `Set-Cookie` → 맵, 맵 → `Cookie` 헤더 변환

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, COOKIE, RETRY_AFTER, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

/// 재시도 대상 상태 코드
pub const RETRY_AFTER_STATUS_CODES: [u16; 3] = [413, 429, 503];

pub const DEFAULT_STATUS_RETRIES: u32 = 10;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.15;

/// backoff/Retry-After 대기 상한
const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// HTTP 오류
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// 상태 코드 기반 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 최대 재시도 횟수 (0이면 비활성)
    pub status: u32,
    /// 대략적인 재시도 간 대기 초
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(status: u32, backoff_factor: f64) -> Self {
        Self {
            status,
            backoff_factor,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 0.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.status > 0
    }

    /// `retries_done`번 재시도한 뒤 받은 `status`를 다시 시도할지
    pub fn should_retry(&self, status: StatusCode, retries_done: u32) -> bool {
        retries_done < self.status && RETRY_AFTER_STATUS_CODES.contains(&status.as_u16())
    }

    /// `retry`번째(1부터) 재시도 전 대기 시간. 첫 재시도는 즉시.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2f64.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        if secs >= BACKOFF_MAX.as_secs_f64() {
            return BACKOFF_MAX;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_RETRIES, DEFAULT_BACKOFF_FACTOR)
    }
}

/// 재시도 정책이 붙은 HTTP 클라이언트
#[derive(Debug, Clone)]
pub struct HttpPool {
    client: Client,
    retry: RetryPolicy,
}

/// 인증서 검증 클라이언트 생성
///
/// `status`: 오류 상태(예: 503) 재시도 횟수, 0이면 재시도 없음.
/// `backoff_factor`: 재시도 간 대기 계수 (초).
pub fn create_pool_manager(status: u32, backoff_factor: f64) -> Result<HttpPool, HttpError> {
    let client = Client::builder().use_rustls_tls().build()?;
    Ok(HttpPool::new(client, RetryPolicy::new(status, backoff_factor)))
}

impl HttpPool {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// 요청 전송 (재시도 소진 시 마지막 응답 반환)
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Response, HttpError> {
        self.send_with_retry(url, || {
            self.client
                .request(method.clone(), url)
                .headers(headers.clone())
        })
        .await
    }

    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.request(Method::GET, url, &HeaderMap::new()).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &T,
    ) -> Result<Response, HttpError> {
        self.send_with_retry(url, || {
            self.client.post(url).headers(headers.clone()).json(body)
        })
        .await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response, HttpError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries_done = 0;
        loop {
            let response = build().send().await?;
            let status = response.status();
            if !self.retry.should_retry(status, retries_done) {
                return Ok(response);
            }

            retries_done += 1;
            let wait = retry_after(response.headers())
                .unwrap_or_else(|| self.retry.backoff(retries_done));
            warn!(
                url,
                status = status.as_u16(),
                retry = retries_done,
                wait_ms = wait.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// `Retry-After: <seconds>` 값
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(BACKOFF_MAX))
}

/// `Set-Cookie` 헤더들을 이름 → 값 맵으로 변환
pub fn get_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}

/// 쿠키 맵을 요청용 `Cookie` 헤더로 변환
pub fn cookies_to_header<I, K, V>(cookies: I) -> Result<HeaderMap, HttpError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let joined = cookies
        .into_iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("; ");

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&joined)?);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
    const OK_WITH_COOKIES: &str = "HTTP/1.1 200 OK\r\n\
        Set-Cookie: session=abc123; Path=/; HttpOnly\r\n\
        Set-Cookie: theme=\"dark\"\r\n\
        Content-Length: 2\r\nConnection: close\r\n\r\nok";

    /// 응답 목록을 순서대로 한 번씩 돌려주는 로컬 서버
    async fn serve(responses: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap();
                    read += n;
                    if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/", addr), hits)
    }

    fn pool(retry: RetryPolicy) -> HttpPool {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpPool::new(client, retry)
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let (url, hits) = serve(vec![UNAVAILABLE, UNAVAILABLE, OK_WITH_COOKIES]).await;
        let response = pool(RetryPolicy::new(3, 0.0)).get(&url).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let cookies = get_cookies(response.headers());
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_response() {
        let (url, hits) = serve(vec![UNAVAILABLE, UNAVAILABLE]).await;
        let response = pool(RetryPolicy::new(1, 0.0)).get(&url).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_statuses_not_retried() {
        let (url, hits) = serve(vec![NOT_FOUND]).await;
        let response = pool(RetryPolicy::default()).get(&url).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_sends_once() {
        let (url, hits) = serve(vec![UNAVAILABLE]).await;
        let response = pool(RetryPolicy::disabled()).get(&url).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(10, 0.5);
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(30), BACKOFF_MAX);
        assert_eq!(RetryPolicy::disabled().backoff(5), Duration::ZERO);
    }

    #[test]
    fn test_backoff_caps_huge_waits() {
        let policy = RetryPolicy::new(100, 0.15);
        assert_eq!(policy.backoff(70), BACKOFF_MAX);
        assert_eq!(policy.backoff(u32::MAX), BACKOFF_MAX);
        assert_eq!(RetryPolicy::new(10, 1e30).backoff(2), BACKOFF_MAX);
        assert_eq!(RetryPolicy::new(10, f64::INFINITY).backoff(2), BACKOFF_MAX);
        assert_eq!(RetryPolicy::new(10, f64::NAN).backoff(2), Duration::ZERO);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::new(2, 0.1);
        assert!(policy.should_retry(StatusCode::SERVICE_UNAVAILABLE, 0));
        assert!(policy.should_retry(StatusCode::TOO_MANY_REQUESTS, 1));
        assert!(!policy.should_retry(StatusCode::TOO_MANY_REQUESTS, 2));
        assert!(!policy.should_retry(StatusCode::INTERNAL_SERVER_ERROR, 0));
        assert!(!RetryPolicy::disabled().is_enabled());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_cookies_to_header() {
        let mut cookies = BTreeMap::new();
        cookies.insert("a".to_string(), "1".to_string());
        cookies.insert("b".to_string(), "two".to_string());

        let headers = cookies_to_header(&cookies).unwrap();
        assert_eq!(headers.get(COOKIE).unwrap(), "a=1; b=two");

        assert!(cookies_to_header([("bad", "line\nbreak")]).is_err());
    }

    #[test]
    fn test_parse_set_cookie_ignores_malformed() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("=orphan"));
        headers.append(SET_COOKIE, HeaderValue::from_static("novalue"));
        headers.append(SET_COOKIE, HeaderValue::from_static("id=42; Secure"));
        let cookies = get_cookies(&headers);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies["id"], "42");
    }

    #[test]
    fn test_create_pool_manager() {
        let pool = create_pool_manager(DEFAULT_STATUS_RETRIES, DEFAULT_BACKOFF_FACTOR).unwrap();
        assert_eq!(pool.retry_policy(), RetryPolicy::default());
    }
}
