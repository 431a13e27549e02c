//! Services - 호스트 DI 경계
//!
//! 코어는 특정 DI 컨테이너를 가정하지 않습니다. 호스트는 `ServiceResolver`
//! 하나만 제공하면 됩니다. `ServiceCollection`/`ServiceProvider`는 그 최소 구현입니다.

use super::loader::PluginLoader;
use plugcode_foundation::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 해석된 서비스 인스턴스
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

// ============================================================================
// ServiceResolver - 호스트가 제공하는 조회 인터페이스
// ============================================================================

/// 요청한 타입의 인스턴스를 돌려주는 리졸버
pub trait ServiceResolver: Send + Sync {
    /// 타입 ID로 서비스 조회 (없으면 `None`)
    fn get_service(&self, service: TypeId) -> Option<ServiceInstance>;
}

/// 타입 기반 조회 헬퍼
pub trait ServiceResolverExt: ServiceResolver {
    /// `T` 서비스 조회
    fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get_service(TypeId::of::<T>())
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// `T` 서비스 조회, 없으면 `ServiceNotFound`
    fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>()
            .ok_or_else(|| Error::ServiceNotFound(type_name::<T>().to_string()))
    }

    /// 등록된 플러그인 로더 조회
    fn plugin_loader(&self) -> Option<Arc<PluginLoader>> {
        self.resolve::<PluginLoader>()
    }
}

impl<R: ServiceResolver + ?Sized> ServiceResolverExt for R {}

// ============================================================================
// ServiceCollection - ServicePlugin이 서비스를 등록하는 수집기
// ============================================================================

/// 서비스 수집기
#[derive(Default)]
pub struct ServiceCollection {
    services: HashMap<TypeId, ServiceInstance>,
    names: Vec<&'static str>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 싱글톤 등록 (같은 타입은 교체)
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.add_shared(Arc::new(service))
    }

    /// 공유 인스턴스 등록
    pub fn add_shared<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        let name = type_name::<T>();
        if self.services.insert(TypeId::of::<T>(), service).is_none() {
            self.names.push(name);
        }
        debug!("Registered service: {}", name);
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// 등록 순서대로 서비스 타입 이름
    pub fn service_names(&self) -> &[&'static str] {
        &self.names
    }

    /// 불변 리졸버로 변환
    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            services: self.services,
        }
    }
}

// ============================================================================
// ServiceProvider - 빌드된 리졸버
// ============================================================================

/// `ServiceCollection`에서 빌드된 리졸버
#[derive(Default, Clone)]
pub struct ServiceProvider {
    services: HashMap<TypeId, ServiceInstance>,
}

impl ServiceProvider {
    /// 빈 리졸버
    pub fn empty() -> Self {
        Self::default()
    }
}

impl ServiceResolver for ServiceProvider {
    fn get_service(&self, service: TypeId) -> Option<ServiceInstance> {
        self.services.get(&service).cloned()
    }
}
