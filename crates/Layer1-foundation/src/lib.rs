//! # plugcode-foundation
//!
//! Foundation layer for PlugCode:
//! - Error: 중앙 에러 타입 (`Error`, `Result`)
//! - Config: 로더 설정 (`LoaderSettings`, 레벨별 병합)
//! - Logging: tracing 구독자 초기화

pub mod config;
pub mod error;
pub mod logging;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    load_settings_from_file, merge_settings, strip_json_comments, LoaderSettings, SettingsLoader,
    CONFIG_DIR_NAME, DEFAULT_MANIFEST_SUFFIX, SETTINGS_FILE, SETTINGS_LOCAL_FILE,
};
