use chrono::{DateTime, Local};

/// 디버그 플래그 환경 변수
pub const DEBUG_ENV: &str = "ONG_DEBUG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Mac,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::Mac => "macOS",
            Platform::Other => "other",
        }
    }
}

pub fn is_windows() -> bool {
    Platform::current() == Platform::Windows
}

pub fn is_linux() -> bool {
    Platform::current() == Platform::Linux
}

pub fn is_mac() -> bool {
    Platform::current() == Platform::Mac
}

/// 디버그 빌드이거나 `ONG_DEBUG`가 참 값이면 true
pub fn is_debugging() -> bool {
    cfg!(debug_assertions) || env_flag(std::env::var(DEBUG_ENV).ok().as_deref())
}

fn env_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

/// 로컬 타임존 기준 현재 시각
pub fn local_now() -> DateTime<Local> {
    Local::now()
}
