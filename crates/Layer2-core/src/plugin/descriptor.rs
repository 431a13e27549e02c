//! Plugin Descriptor - 아직 인스턴스화되지 않은 플러그인 타입
//!
//! 리플렉션 대신 타입별 팩토리를 명시적으로 등록합니다.
//! - 기본 생성자 (`Default` 또는 인자 없는 클로저)
//! - 리졸버 주입 팩토리 (0개 이상)

use super::directory::PluginInstance;
use super::services::ServiceResolver;
use super::traits::{CapabilitySet, Plugin};
use plugcode_foundation::{Error, Result};
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

/// 타입 소거된 생성 결과
pub(crate) type BoxedPlugin = Box<dyn Any + Send + Sync>;

// ============================================================================
// TypeKey - 플러그인 타입 식별자
// ============================================================================

/// 타입 ID + 정규 이름
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 정규 타입 이름 (`std::any::type_name`)
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// PluginFactory - 타입 소거된 팩토리
// ============================================================================

pub(crate) trait PluginFactory: Send + Sync {
    fn has_default(&self) -> bool;

    fn injected_count(&self) -> usize;

    fn construct_default(&self) -> Option<BoxedPlugin>;

    /// 첫 번째 주입 팩토리로 생성 (선택 규칙은 엔진이 적용)
    fn construct_injected(&self, resolver: &dyn ServiceResolver) -> Result<BoxedPlugin>;

    /// 구성 완료된 값을 `PluginInstance`로 변환
    fn publish(&self, raw: BoxedPlugin) -> Result<PluginInstance>;
}

type DefaultCtor<T> = Arc<dyn Fn() -> T + Send + Sync>;
type InjectedCtor<T> = Arc<dyn Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync>;

struct TypedFactory<T> {
    default_ctor: Option<DefaultCtor<T>>,
    injected: Vec<InjectedCtor<T>>,
}

impl<T: Plugin> PluginFactory for TypedFactory<T> {
    fn has_default(&self) -> bool {
        self.default_ctor.is_some()
    }

    fn injected_count(&self) -> usize {
        self.injected.len()
    }

    fn construct_default(&self) -> Option<BoxedPlugin> {
        self.default_ctor
            .as_ref()
            .map(|ctor| Box::new(ctor()) as BoxedPlugin)
    }

    fn construct_injected(&self, resolver: &dyn ServiceResolver) -> Result<BoxedPlugin> {
        let factory = self.injected.first().ok_or_else(|| {
            Error::Internal(format!("no injected factory for {}", type_name::<T>()))
        })?;
        Ok(Box::new(factory(resolver)?))
    }

    fn publish(&self, raw: BoxedPlugin) -> Result<PluginInstance> {
        let plugin: Arc<T> = raw
            .downcast::<T>()
            .map(Arc::from)
            .map_err(|_| Error::Internal(format!("type mismatch for {}", type_name::<T>())))?;

        let mut capabilities = CapabilitySet::new();
        capabilities.insert::<dyn Plugin>(plugin.clone());
        Arc::clone(&plugin).declare_capabilities(&mut capabilities);

        Ok(PluginInstance::new(
            TypeKey::of::<T>(),
            Arc::clone(&plugin) as Arc<dyn Plugin>,
            plugin,
            capabilities,
        ))
    }
}

// ============================================================================
// PluginDescriptor
// ============================================================================

/// 인스턴스화 전 플러그인 타입 참조
#[derive(Clone)]
pub struct PluginDescriptor {
    key: TypeKey,
    factory: Arc<dyn PluginFactory>,
}

impl PluginDescriptor {
    /// 기본 생성자(`Default`)를 가진 타입
    pub fn of<T: Plugin + Default>() -> Self {
        Self::builder::<T>().default_constructor().build()
    }

    /// 생성자 없이 선언만 된 타입 (flush 시 제외됨)
    pub fn declared<T: Plugin>() -> Self {
        Self::builder::<T>().build()
    }

    /// 리졸버 주입 팩토리만 가진 타입
    pub fn injected<T, F>(factory: F) -> Self
    where
        T: Plugin,
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        Self::builder::<T>().injected(factory).build()
    }

    pub fn builder<T: Plugin>() -> DescriptorBuilder<T> {
        DescriptorBuilder {
            default_ctor: None,
            injected: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    pub fn type_id(&self) -> TypeId {
        self.key.id()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.key.id() == TypeId::of::<T>()
    }

    pub fn has_default_constructor(&self) -> bool {
        self.factory.has_default()
    }

    pub fn injected_factories(&self) -> usize {
        self.factory.injected_count()
    }

    pub(crate) fn factory(&self) -> &dyn PluginFactory {
        self.factory.as_ref()
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("type", &self.key.name())
            .field("default", &self.factory.has_default())
            .field("injected", &self.factory.injected_count())
            .finish()
    }
}

/// `PluginDescriptor` 빌더
pub struct DescriptorBuilder<T> {
    default_ctor: Option<DefaultCtor<T>>,
    injected: Vec<InjectedCtor<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Plugin> DescriptorBuilder<T> {
    /// 인자 없는 생성자 지정
    pub fn constructor<F>(mut self, ctor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default_ctor = Some(Arc::new(ctor));
        self
    }

    /// 리졸버 주입 팩토리 추가
    ///
    /// 리졸버가 있는 flush에서 정확히 하나일 때만 사용되고,
    /// 둘 이상이면 `AmbiguousConstructor` 에러가 됩니다.
    pub fn injected<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn ServiceResolver) -> Result<T> + Send + Sync + 'static,
    {
        self.injected.push(Arc::new(factory));
        self
    }

    pub fn build(self) -> PluginDescriptor {
        PluginDescriptor {
            key: TypeKey::of::<T>(),
            factory: Arc::new(TypedFactory {
                default_ctor: self.default_ctor,
                injected: self.injected,
            }),
        }
    }
}

impl<T: Plugin + Default> DescriptorBuilder<T> {
    /// `T::default`를 기본 생성자로 사용
    pub fn default_constructor(self) -> Self {
        self.constructor(T::default)
    }
}

// ============================================================================
// Type Sources - 후보 타입 공급원
// ============================================================================

/// 후보 타입의 형태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Concrete,
    Abstract,
}

/// 후보 타입의 외부 노출 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Hidden,
}

/// 소스가 제공하는 후보 타입
#[derive(Debug, Clone)]
pub struct CandidateType {
    name: String,
    shape: TypeShape,
    visibility: Visibility,
    descriptor: Option<PluginDescriptor>,
}

impl CandidateType {
    /// 플러그인 타입 (concrete, public)
    pub fn plugin(descriptor: PluginDescriptor) -> Self {
        Self {
            name: descriptor.type_name().to_string(),
            shape: TypeShape::Concrete,
            visibility: Visibility::Public,
            descriptor: Some(descriptor),
        }
    }

    /// 기본 플러그인 capability를 구현하지 않는 타입
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: TypeShape::Concrete,
            visibility: Visibility::Public,
            descriptor: None,
        }
    }

    pub fn abstract_type(mut self) -> Self {
        self.shape = TypeShape::Abstract;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visibility = Visibility::Hidden;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TypeShape {
        self.shape
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn descriptor(&self) -> Option<&PluginDescriptor> {
        self.descriptor.as_ref()
    }

    /// concrete + public + 플러그인이면 디스크립터 반환
    pub fn loadable(&self) -> Option<&PluginDescriptor> {
        match (self.shape, self.visibility) {
            (TypeShape::Concrete, Visibility::Public) => self.descriptor.as_ref(),
            _ => None,
        }
    }
}

/// 후보 타입 공급원 (카탈로그, 매니페스트 등)
pub trait TypeSource {
    /// 소스 이름 (에러/로그용)
    fn name(&self) -> &str;

    /// 후보 타입 목록 해석
    fn candidates(&self) -> Result<Vec<CandidateType>>;
}

/// 메모리 내 고정 후보 목록
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    candidates: Vec<CandidateType>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
        }
    }

    pub fn with(mut self, candidate: CandidateType) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn push(&mut self, candidate: CandidateType) {
        self.candidates.push(candidate);
    }
}

impl TypeSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self) -> Result<Vec<CandidateType>> {
        Ok(self.candidates.clone())
    }
}
