//! Config - 플러그인 로더 설정
//!
//! - `settings.rs` - LoaderSettings 및 레벨별 병합 로더

mod settings;

pub use settings::{
    load_settings_from_file, merge_settings, strip_json_comments, LoaderSettings, SettingsLoader,
    CONFIG_DIR_NAME, DEFAULT_MANIFEST_SUFFIX, SETTINGS_FILE, SETTINGS_LOCAL_FILE,
};
