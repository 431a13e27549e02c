//! Plugin traits - 핵심 플러그인 인터페이스 (Capability Model)
//!
//! 플러그인은 기본 `Plugin` 트레이트와 0개 이상의 capability 트레이트를 구현하고,
//! `declare_capabilities`에서 자신이 노출할 capability를 `CapabilitySet`에 등록합니다.
//! 조회는 이름 문자열이 아니라 타입 ID(`TypeId::of::<dyn Capability>()`)로 합니다.

use super::diagnostics::{DiagnosticError, DiagnosticReport};
use super::exports::ApiExport;
use super::services::{ServiceCollection, ServiceResolver};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Plugin Trait - 모든 플러그인이 구현해야 하는 인터페이스
// ============================================================================

/// 기본 플러그인 capability
pub trait Plugin: Send + Sync + 'static {
    /// 카탈로그 키 (인스턴스 수명 동안 고정)
    fn plugin_id(&self) -> &str;

    /// 카테고리 레이블 (고유하지 않음)
    fn plugin_type(&self) -> &str;

    /// 기본 정보
    fn info(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// 실행 환경 자가 진단
    ///
    /// 진단을 제공하지 않는 플러그인은 기본 구현(`NotImplemented`)을 그대로 둡니다.
    fn environment_diagnostic(
        &self,
        _resolver: &dyn ServiceResolver,
    ) -> Result<DiagnosticReport, DiagnosticError> {
        Err(DiagnosticError::NotImplemented)
    }

    /// 추가 capability 등록
    ///
    /// ```ignore
    /// fn declare_capabilities(self: Arc<Self>, caps: &mut CapabilitySet) {
    ///     caps.insert::<dyn ApiProvider>(self);
    /// }
    /// ```
    fn declare_capabilities(self: Arc<Self>, _caps: &mut CapabilitySet) {}

    /// 디렉토리에서 해제될 때 호출
    fn on_unload(&self) {}
}

/// 서비스 구성 capability
pub trait ServicePlugin: Plugin {
    fn configure_services(&self, services: &mut ServiceCollection);
}

/// API export capability
pub trait ApiProvider: Plugin {
    fn export_api(&self) -> Vec<ApiExport>;
}

/// 보완 capability - 빌드된 리졸버를 전달받음
pub trait ComplementaryPlugin: Send + Sync {
    fn on_services(&self, resolver: &dyn ServiceResolver);
}

// ============================================================================
// CapabilitySet - 인스턴스가 노출하는 capability 테이블
// ============================================================================

struct CapabilityEntry {
    name: &'static str,
    handle: Box<dyn Any + Send + Sync>,
}

/// capability 타입 ID → `Arc<dyn Capability>` 핸들
#[derive(Default)]
pub struct CapabilitySet {
    entries: HashMap<TypeId, CapabilityEntry>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// capability 등록
    ///
    /// `C`는 보통 트레이트 객체 타입입니다 (`dyn ApiProvider`).
    pub fn insert<C>(&mut self, capability: Arc<C>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.entries.insert(
            TypeId::of::<C>(),
            CapabilityEntry {
                name: type_name::<C>(),
                handle: Box::new(capability),
            },
        );
        self
    }

    /// capability 핸들 조회
    pub fn get<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.handle.downcast_ref::<Arc<C>>())
            .cloned()
    }

    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// 등록된 capability 이름 (정렬됨)
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
