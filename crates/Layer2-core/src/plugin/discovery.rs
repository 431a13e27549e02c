//! Plugin Discovery - 카탈로그와 매니페스트 기반 타입 소스
//!
//! 임의의 타입 공간을 열어볼 수 없으므로, 호스트가 컴파일된 플러그인 타입을
//! `PluginCatalog`에 이름으로 등록합니다. 매니페스트 파일은 그 이름들을 나열합니다.
//!
//! ```json
//! {
//!   // 주석 허용
//!   "name": "billing",
//!   "plugins": ["billing.invoice", "billing.tax"]
//! }
//! ```

use super::descriptor::{CandidateType, PluginDescriptor, TypeSource};
use plugcode_foundation::config::strip_json_comments;
use plugcode_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

// ============================================================================
// PluginCatalog
// ============================================================================

/// 이름 → 후보 타입 카탈로그 (등록 순서 유지)
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    entries: Vec<(String, CandidateType)>,
    index: HashMap<String, usize>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 타입을 이름으로 등록
    pub fn register(&mut self, name: impl Into<String>, descriptor: PluginDescriptor) -> &mut Self {
        self.register_candidate(name, CandidateType::plugin(descriptor))
    }

    /// 임의 후보 등록 (같은 이름은 교체)
    pub fn register_candidate(&mut self, name: impl Into<String>, candidate: CandidateType) -> &mut Self {
        let name = name.into();
        match self.index.get(&name) {
            Some(&slot) => self.entries[slot].1 = candidate,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, candidate));
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&CandidateType> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 등록 순서대로 이름
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeSource for PluginCatalog {
    fn name(&self) -> &str {
        "catalog"
    }

    fn candidates(&self) -> Result<Vec<CandidateType>> {
        Ok(self.entries.iter().map(|(_, candidate)| candidate.clone()).collect())
    }
}

// ============================================================================
// PluginManifest / ManifestSource
// ============================================================================

/// 매니페스트 파일 형식
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// 소스 이름
    pub name: String,

    /// 카탈로그 이름 목록 (순서 유지)
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl PluginManifest {
    /// JSON 파싱 (주석 허용)
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(&strip_json_comments(content))?)
    }
}

/// 매니페스트 + 카탈로그로 해석되는 타입 소스
#[derive(Debug, Clone)]
pub struct ManifestSource {
    manifest: PluginManifest,
    path: Option<PathBuf>,
    catalog: Arc<PluginCatalog>,
}

impl ManifestSource {
    pub fn new(manifest: PluginManifest, catalog: Arc<PluginCatalog>) -> Self {
        Self {
            manifest,
            path: None,
            catalog,
        }
    }

    /// 매니페스트 파일 동기 읽기
    pub fn from_file(path: &Path, catalog: Arc<PluginCatalog>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::source_resolution(path.display().to_string(), e.to_string()))?;
        Self::from_content(path, &content, catalog)
    }

    /// 매니페스트 파일 비동기 읽기
    pub async fn read(path: &Path, catalog: Arc<PluginCatalog>) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| Error::source_resolution(path.display().to_string(), e.to_string()))?;
        Self::from_content(path, &content, catalog)
    }

    fn from_content(path: &Path, content: &str, catalog: Arc<PluginCatalog>) -> Result<Self> {
        let manifest = PluginManifest::parse(content)
            .map_err(|e| Error::source_resolution(path.display().to_string(), e.to_string()))?;
        debug!("Read manifest {} from {:?}", manifest.name, path);

        Ok(Self {
            manifest,
            path: Some(path.to_path_buf()),
            catalog,
        })
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl TypeSource for ManifestSource {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    /// 모든 이름이 카탈로그에 있어야 성공
    fn candidates(&self) -> Result<Vec<CandidateType>> {
        self.manifest
            .plugins
            .iter()
            .map(|name| {
                self.catalog.get(name).cloned().ok_or_else(|| {
                    Error::source_resolution(
                        self.manifest.name.clone(),
                        format!("unknown plugin type {}", name),
                    )
                })
            })
            .collect()
    }
}

// ============================================================================
// 디렉토리 스캔
// ============================================================================

/// `dir`에서 `suffix`로 끝나는 매니페스트 파일 (파일 이름순)
pub async fn manifest_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::source_resolution(dir.display().to_string(), e.to_string()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(suffix));

        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    info!("Found {} manifests in {:?}", files.len(), dir);
    Ok(files)
}
