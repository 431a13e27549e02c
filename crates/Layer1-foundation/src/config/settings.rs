//! Loader Settings
//!
//! 플러그인 로더 설정 (`.plugcode` 폴더)
//!
//! ## 검색 우선순위
//!
//! 1. User-level: `~/.plugcode/settings.json`
//! 2. Project-level: `.plugcode/settings.json`
//! 3. Local (gitignored): `.plugcode/settings.local.json`
//!
//! 각 레벨의 설정이 이전 레벨을 오버라이드합니다.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 설정 폴더 이름
pub const CONFIG_DIR_NAME: &str = ".plugcode";

/// 설정 파일명
pub const SETTINGS_FILE: &str = "settings.json";

/// 로컬 설정 파일명 (gitignored)
pub const SETTINGS_LOCAL_FILE: &str = "settings.local.json";

/// 기본 매니페스트 파일 접미사
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".plugin.json";

// ============================================================================
// LoaderSettings
// ============================================================================

/// 플러그인 로더 설정
///
/// 모든 필드는 선택적이며, 병합 시 지정된 값만 이전 레벨을 덮어씁니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderSettings {
    /// 매니페스트를 검색할 디렉토리 목록
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,

    /// 매니페스트 파일 접미사 (기본 `.plugin.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_suffix: Option<String>,

    /// 콘솔 진단 핸들러 등록 여부
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_diagnostics: Option<bool>,

    /// 진단 실패 시 중단 여부
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_on_failure: Option<bool>,
}

impl LoaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest_suffix(&self) -> &str {
        self.manifest_suffix
            .as_deref()
            .unwrap_or(DEFAULT_MANIFEST_SUFFIX)
    }

    pub fn console_diagnostics(&self) -> bool {
        self.console_diagnostics.unwrap_or(false)
    }

    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure.unwrap_or(false)
    }
}

// ============================================================================
// SettingsLoader
// ============================================================================

/// 설정 파일 경로 정보
#[derive(Debug, Clone)]
struct SettingsPath {
    path: PathBuf,
    /// 우선순위 (높을수록 우선)
    priority: u8,
    description: &'static str,
}

/// 레벨별 설정을 찾아 병합하는 로더
pub struct SettingsLoader {
    search_paths: Vec<SettingsPath>,
}

impl SettingsLoader {
    /// 기본 검색 경로 (user → project → local)
    pub fn new(working_dir: &Path) -> Self {
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            paths.push(SettingsPath {
                path: home.join(CONFIG_DIR_NAME).join(SETTINGS_FILE),
                priority: 10,
                description: "User settings",
            });
        }

        paths.push(SettingsPath {
            path: working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE),
            priority: 20,
            description: "Project settings",
        });

        paths.push(SettingsPath {
            path: working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_LOCAL_FILE),
            priority: 30,
            description: "Local settings",
        });

        paths.sort_by_key(|p| p.priority);

        Self { search_paths: paths }
    }

    /// 커스텀 검색 경로로 생성 (앞에 있을수록 낮은 우선순위)
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        let search_paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| SettingsPath {
                path,
                priority: i as u8,
                description: "Custom",
            })
            .collect();

        Self { search_paths }
    }

    /// 모든 경로에서 설정 로드하여 병합
    ///
    /// 파싱에 실패한 파일은 경고 후 건너뜁니다.
    pub fn load_all(&self) -> LoaderSettings {
        let mut merged = LoaderSettings::new();

        for settings_path in &self.search_paths {
            if !settings_path.path.exists() {
                continue;
            }

            match load_settings_from_file(&settings_path.path) {
                Ok(settings) => {
                    info!(
                        "Loaded {} from: {}",
                        settings_path.description,
                        settings_path.path.display()
                    );
                    merged = merge_settings(merged, settings);
                }
                Err(e) => {
                    warn!(
                        "Failed to load settings from {}: {}",
                        settings_path.path.display(),
                        e
                    );
                }
            }
        }

        merged
    }

    /// 존재하는 설정 파일 목록
    pub fn existing_files(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .filter(|p| p.path.exists())
            .map(|p| p.path.clone())
            .collect()
    }
}

// ============================================================================
// 유틸리티 함수
// ============================================================================

/// 파일에서 설정 로드
pub fn load_settings_from_file(path: &Path) -> Result<LoaderSettings> {
    let content = std::fs::read_to_string(path)?;
    let content = strip_json_comments(&content);

    let settings: LoaderSettings = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Invalid settings at {}: {}", path.display(), e))
    })?;

    debug!(
        "Loaded settings from {}: {} plugin dirs",
        path.display(),
        settings.plugin_dirs.len()
    );

    Ok(settings)
}

/// 두 설정 병합 (later가 earlier를 오버라이드)
pub fn merge_settings(earlier: LoaderSettings, later: LoaderSettings) -> LoaderSettings {
    LoaderSettings {
        // 디렉토리: 병합 (중복 제거, 순서 유지)
        plugin_dirs: {
            let mut merged = earlier.plugin_dirs;
            for dir in later.plugin_dirs {
                if !merged.contains(&dir) {
                    merged.push(dir);
                }
            }
            merged
        },
        manifest_suffix: later.manifest_suffix.or(earlier.manifest_suffix),
        console_diagnostics: later.console_diagnostics.or(earlier.console_diagnostics),
        stop_on_failure: later.stop_on_failure.or(earlier.stop_on_failure),
    }
}

/// 주석 스캐너 상태
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Str,
    StrEscape,
    Slash,
    Line,
    Block,
    BlockStar,
}

/// JSON 주석 제거 (`//`, `/* */`)
///
/// 문자열 리터럴 안의 `//`(URL 등)는 그대로 둡니다. 줄 주석의 개행은 남깁니다.
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = Scan::Code;

    for c in input.chars() {
        state = match (state, c) {
            (Scan::Code, '/') => Scan::Slash,
            (Scan::Code, '"') => {
                output.push(c);
                Scan::Str
            }
            (Scan::Code, _) => {
                output.push(c);
                Scan::Code
            }
            (Scan::Str, '\\') => {
                output.push(c);
                Scan::StrEscape
            }
            (Scan::Str, '"') => {
                output.push(c);
                Scan::Code
            }
            (Scan::Str | Scan::StrEscape, _) => {
                output.push(c);
                Scan::Str
            }
            (Scan::Slash, '/') => Scan::Line,
            (Scan::Slash, '*') => Scan::Block,
            (Scan::Slash, _) => {
                output.push('/');
                output.push(c);
                if c == '"' {
                    Scan::Str
                } else {
                    Scan::Code
                }
            }
            (Scan::Line, '\n') => {
                output.push(c);
                Scan::Code
            }
            (Scan::Line, _) => Scan::Line,
            (Scan::Block | Scan::BlockStar, '*') => Scan::BlockStar,
            (Scan::BlockStar, '/') => Scan::Code,
            (Scan::Block | Scan::BlockStar, _) => Scan::Block,
        };
    }

    if state == Scan::Slash {
        output.push('/');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = LoaderSettings::new();
        assert_eq!(settings.manifest_suffix(), DEFAULT_MANIFEST_SUFFIX);
        assert!(!settings.console_diagnostics());
        assert!(!settings.stop_on_failure());
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(SETTINGS_FILE);
        fs::write(
            &file,
            r#"{
                // 진단 설정
                "pluginDirs": ["plugins"],
                "consoleDiagnostics": true,
                "stopOnFailure": true
            }"#,
        )
        .unwrap();

        let settings = load_settings_from_file(&file).unwrap();
        assert_eq!(settings.plugin_dirs, vec![PathBuf::from("plugins")]);
        assert!(settings.console_diagnostics());
        assert!(settings.stop_on_failure());
    }

    #[test]
    fn test_invalid_settings_is_config_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(SETTINGS_FILE);
        fs::write(&file, r#"{"pluginDirs": 42}"#).unwrap();

        let err = load_settings_from_file(&file).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_merge_settings() {
        let earlier = LoaderSettings {
            plugin_dirs: vec![PathBuf::from("a")],
            stop_on_failure: Some(true),
            ..Default::default()
        };
        let later = LoaderSettings {
            plugin_dirs: vec![PathBuf::from("a"), PathBuf::from("b")],
            console_diagnostics: Some(true),
            ..Default::default()
        };

        let merged = merge_settings(earlier, later);
        assert_eq!(merged.plugin_dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        // later에 없으면 earlier 유지
        assert!(merged.stop_on_failure());
        assert!(merged.console_diagnostics());
    }

    #[test]
    fn test_loader_load_all() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR_NAME);
        fs::create_dir_all(&config_dir).unwrap();

        let project = config_dir.join(SETTINGS_FILE);
        fs::write(&project, r#"{"manifestSuffix": ".mod.json", "stopOnFailure": true}"#).unwrap();

        let local = config_dir.join(SETTINGS_LOCAL_FILE);
        fs::write(&local, r#"{"stopOnFailure": false}"#).unwrap();

        let loader = SettingsLoader::with_paths(vec![project, local]);
        let settings = loader.load_all();

        assert_eq!(settings.manifest_suffix(), ".mod.json");
        assert!(!settings.stop_on_failure());
        assert_eq!(loader.existing_files().len(), 2);
    }

    #[test]
    fn test_strip_json_comments() {
        let input = r#"{
            // This is a comment
            "key": "value", /* inline comment */
            "url": "http://example.com"
        }"#;

        let output = strip_json_comments(input);
        assert!(!output.contains("comment"));
        assert!(output.contains("http://example.com"));
    }

    #[test]
    fn test_strip_json_comments_edge_cases() {
        // 이스케이프된 따옴표 뒤의 `//`는 문자열 안
        let input = r#"{"a": "say \"hi\" // not a comment"} // gone"#;
        let output = strip_json_comments(input);
        assert_eq!(output, r#"{"a": "say \"hi\" // not a comment"} "#);

        assert_eq!(strip_json_comments("[1 /* a ** b */, 2]"), "[1 , 2]");
        assert_eq!(strip_json_comments("4 / 2"), "4 / 2");
        assert_eq!(strip_json_comments("x/"), "x/");
    }
}
