//! Error types for PlugCode
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// PlugCode 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 플러그인 로드 관련
    // ========================================================================
    /// 타입 소스(매니페스트, 카탈로그 등)를 해석할 수 없음
    #[error("Source resolution failed: {source_name} - {reason}")]
    SourceResolution { source_name: String, reason: String },

    /// 같은 타입에 설정 바인딩이 두 번 등록됨
    #[error("Configuration binding already registered for {0}")]
    DuplicateBinding(String),

    /// 주입 생성자가 둘 이상이라 선택할 수 없음
    #[error("Ambiguous constructor for {plugin}: {count} injected factories registered")]
    AmbiguousConstructor { plugin: String, count: usize },

    #[error("Plugin error: {0}")]
    Plugin(String),

    // ========================================================================
    // 진단 / Export 관련
    // ========================================================================
    /// stop-on-failure 핸들러가 실패한 진단을 받음
    #[error("The plugin {0} diagnostic environment is not success")]
    PluginDiagnostic(String),

    #[error("No matching export for signature: {0}")]
    NoMatchingExport(String),

    // ========================================================================
    // 서비스 해석 관련
    // ========================================================================
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 소스 해석 에러 생성 헬퍼
    pub fn source_resolution(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SourceResolution {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// 플러그인 코드 에러 생성 헬퍼
    pub fn plugin(message: impl Into<String>) -> Self {
        Error::Plugin(message.into())
    }
}
