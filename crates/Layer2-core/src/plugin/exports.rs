//! API Exports - 플러그인이 제공하는 호출 가능 값 테이블
//!
//! Export의 키는 호출 시그니처, 즉 저장된 호출 값의 타입입니다.
//! 보통 `dyn Fn(..) -> .. + Send + Sync` 트레이트 객체 타입을 사용합니다.
//!
//! ```ignore
//! type Greet = dyn Fn(&str) -> String + Send + Sync;
//!
//! let export = ApiExport::new::<Greet>(Arc::new(|name: &str| format!("hi {name}")));
//! table.import(export);
//! let greet = table.get::<Greet>()?;
//! ```

use plugcode_foundation::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// ApiExport
// ============================================================================

/// 시그니처로 식별되는 호출 가능 값
#[derive(Clone)]
pub struct ApiExport {
    signature: TypeId,
    signature_name: &'static str,
    callable: Arc<dyn Any + Send + Sync>,
    owner: Option<String>,
}

impl ApiExport {
    /// 새 export 생성 (`S`가 시그니처)
    pub fn new<S>(callable: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        Self {
            signature: TypeId::of::<S>(),
            signature_name: type_name::<S>(),
            callable: Arc::new(callable),
            owner: None,
        }
    }

    /// 제공 플러그인 지정
    pub fn with_owner(mut self, plugin_id: impl Into<String>) -> Self {
        self.owner = Some(plugin_id.into());
        self
    }

    pub fn signature_name(&self) -> &'static str {
        self.signature_name
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn matches<S: ?Sized + 'static>(&self) -> bool {
        self.signature == TypeId::of::<S>()
    }

    /// 시그니처가 `S`이면 호출 값 반환
    pub fn downcast<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.callable.downcast_ref::<Arc<S>>().cloned()
    }
}

impl std::fmt::Debug for ApiExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiExport")
            .field("signature", &self.signature_name)
            .field("owner", &self.owner)
            .finish()
    }
}

// ============================================================================
// ExportTable
// ============================================================================

/// Export 테이블 - 삽입 순서 유지, 중복 제거 없음
#[derive(Default)]
pub struct ExportTable {
    exports: parking_lot::RwLock<Vec<ApiExport>>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// export 추가 (출처 무관)
    pub fn import(&self, export: ApiExport) {
        debug!("Imported export: {}", export.signature_name());
        self.exports.write().push(export);
    }

    /// 여러 export 추가
    pub fn extend(&self, exports: impl IntoIterator<Item = ApiExport>) -> usize {
        let mut table = self.exports.write();
        let before = table.len();
        table.extend(exports);
        table.len() - before
    }

    /// 시그니처가 `S`인 첫 번째 export
    pub fn get<S>(&self) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.exports
            .read()
            .iter()
            .find_map(|export| export.downcast::<S>())
            .ok_or_else(|| Error::NoMatchingExport(type_name::<S>().to_string()))
    }

    /// 특정 플러그인이 제공한 export 제거
    pub fn retract(&self, plugin_id: &str) -> usize {
        let mut table = self.exports.write();
        let before = table.len();
        table.retain(|export| export.owner() != Some(plugin_id));
        before - table.len()
    }

    /// 삽입 순서대로 시그니처 이름
    pub fn signatures(&self) -> Vec<&'static str> {
        self.exports
            .read()
            .iter()
            .map(|export| export.signature_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Greet = dyn Fn(&str) -> String + Send + Sync;
    type Add = dyn Fn(i64, i64) -> i64 + Send + Sync;

    #[test]
    fn test_first_match_wins() {
        let table = ExportTable::new();
        table.import(ApiExport::new::<Greet>(Arc::new(|name: &str| format!("A:{name}"))));
        table.import(ApiExport::new::<Greet>(Arc::new(|name: &str| format!("B:{name}"))));

        let greet = table.get::<Greet>().unwrap();
        assert_eq!(greet("kim"), "A:kim");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_by_signature() {
        let table = ExportTable::new();
        table.import(ApiExport::new::<Greet>(Arc::new(|name: &str| name.to_uppercase())));
        table.import(ApiExport::new::<Add>(Arc::new(|a: i64, b: i64| a + b)));

        let add = table.get::<Add>().unwrap();
        assert_eq!(add(2, 3), 5);
    }

    #[test]
    fn test_no_matching_export() {
        let table = ExportTable::new();
        table.import(ApiExport::new::<Greet>(Arc::new(|name: &str| name.to_string())));

        let err = table.get::<Add>().err().unwrap();
        assert!(matches!(err, Error::NoMatchingExport(_)));
    }

    #[test]
    fn test_retract_by_owner() {
        let table = ExportTable::new();
        table.import(ApiExport::new::<Add>(Arc::new(|a: i64, b: i64| a + b)).with_owner("math"));
        table.import(ApiExport::new::<Add>(Arc::new(|a: i64, b: i64| a * b)));

        assert_eq!(table.retract("math"), 1);
        let add = table.get::<Add>().unwrap();
        assert_eq!(add(2, 3), 6);
    }
}
