//! Instantiation - 생성자 선택, 설정 바인딩, capability 등록
//!
//! 한 디스크립터의 처리 순서:
//! 1. 생성자 선택 (주입 팩토리 / 기본 생성자)
//! 2. 해당 타입의 설정 바인딩 적용 (있으면 정확히 한 번)
//! 3. capability 등록 후 `PluginInstance`로 공개
//!
//! 바인딩은 `Arc`로 감싸기 전에 적용되므로, 조회 결과는 항상 설정이 끝난 인스턴스입니다.

use super::descriptor::{BoxedPlugin, PluginDescriptor, TypeKey};
use super::directory::PluginInstance;
use super::services::ServiceResolver;
use super::traits::Plugin;
use parking_lot::RwLock;
use plugcode_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

type BindingAction = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

struct Binding {
    type_name: &'static str,
    action: BindingAction,
}

// ============================================================================
// 결과 타입
// ============================================================================

/// 인스턴스화하지 않고 건너뛴 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 기본 생성자가 없음
    NoDefaultConstructor,
    /// 주입 팩토리만 있는데 리졸버가 없음
    ResolverRequired,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDefaultConstructor => write!(f, "no_default_constructor"),
            Self::ResolverRequired => write!(f, "resolver_required"),
        }
    }
}

/// 디스크립터 하나의 처리 결과
pub enum Instantiation {
    Created {
        instance: PluginInstance,
        configured: bool,
    },
    Skipped(SkipReason),
}

/// 로드된 플러그인 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedPlugin {
    pub plugin_id: String,
    pub type_name: String,
    pub configured: bool,
}

/// 건너뛴 타입 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPlugin {
    pub type_name: String,
    pub reason: SkipReason,
}

/// flush 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlushReport {
    pub loaded: Vec<LoadedPlugin>,
    pub skipped: Vec<SkippedPlugin>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.skipped.is_empty()
    }
}

/// flush 내부 결과 - 실패 이전에 만든 인스턴스도 함께 반환
pub(crate) struct FlushBatch {
    pub instances: Vec<PluginInstance>,
    pub report: FlushReport,
    pub error: Option<Error>,
}

// ============================================================================
// InstantiationEngine
// ============================================================================

/// 설정 바인딩 테이블 + 인스턴스 생성기
#[derive(Default)]
pub struct InstantiationEngine {
    bindings: RwLock<HashMap<TypeId, Binding>>,
}

impl InstantiationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `T`에 대한 설정 바인딩 등록
    ///
    /// 타입당 하나만 허용됩니다. 이미 있으면 기존 바인딩을 유지하고
    /// `DuplicateBinding`을 반환합니다.
    pub fn when<T, F>(&self, action: F) -> Result<()>
    where
        T: Plugin,
        F: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        let mut bindings = self.bindings.write();
        if bindings.contains_key(&TypeId::of::<T>()) {
            return Err(Error::DuplicateBinding(type_name::<T>().to_string()));
        }

        let action: BindingAction = Arc::new(move |raw: &mut (dyn Any + Send + Sync)| {
            let plugin = raw.downcast_mut::<T>().ok_or_else(|| {
                Error::Internal(format!("binding type mismatch for {}", type_name::<T>()))
            })?;
            action(plugin)
        });

        bindings.insert(
            TypeId::of::<T>(),
            Binding {
                type_name: type_name::<T>(),
                action,
            },
        );
        debug!("Registered configuration binding for {}", type_name::<T>());
        Ok(())
    }

    pub fn has_binding<T: 'static>(&self) -> bool {
        self.bindings.read().contains_key(&TypeId::of::<T>())
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }

    /// 바인딩이 등록된 타입 이름 (정렬됨)
    pub fn bound_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.bindings.read().values().map(|b| b.type_name).collect();
        names.sort_unstable();
        names
    }

    /// 디스크립터 하나 인스턴스화
    ///
    /// 리졸버가 있을 때:
    /// - 주입 팩토리가 둘 이상이면 `AmbiguousConstructor`
    /// - 정확히 하나면 그 팩토리 사용
    /// - 없으면 기본 생성자
    ///
    /// 리졸버가 없으면 기본 생성자만 사용합니다.
    pub fn instantiate(
        &self,
        descriptor: &PluginDescriptor,
        resolver: Option<&dyn ServiceResolver>,
    ) -> Result<Instantiation> {
        let factory = descriptor.factory();
        let injected = factory.injected_count();

        let raw = match resolver {
            Some(_) if injected > 1 => {
                return Err(Error::AmbiguousConstructor {
                    plugin: descriptor.type_name().to_string(),
                    count: injected,
                });
            }
            Some(resolver) if injected == 1 => factory.construct_injected(resolver)?,
            _ => match factory.construct_default() {
                Some(raw) => raw,
                None => {
                    let reason = if injected > 0 {
                        SkipReason::ResolverRequired
                    } else {
                        SkipReason::NoDefaultConstructor
                    };
                    return Ok(Instantiation::Skipped(reason));
                }
            },
        };

        let (raw, configured) = self.configure(descriptor.key(), raw)?;
        let instance = factory.publish(raw)?;

        Ok(Instantiation::Created {
            instance,
            configured,
        })
    }

    /// 바인딩 적용 (락 밖에서 호출)
    fn configure(&self, key: TypeKey, mut raw: BoxedPlugin) -> Result<(BoxedPlugin, bool)> {
        let action = self
            .bindings
            .read()
            .get(&key.id())
            .map(|binding| Arc::clone(&binding.action));

        match action {
            Some(action) => {
                action(&mut *raw)?;
                debug!("Applied configuration binding to {}", key.name());
                Ok((raw, true))
            }
            None => Ok((raw, false)),
        }
    }

    /// 대기열을 순서대로 처리
    ///
    /// 에러가 나면 그 디스크립터는 소비되고, 이후 디스크립터는 대기열에 남습니다.
    /// 에러 이전에 만든 인스턴스는 그대로 반환됩니다.
    pub(crate) fn flush(
        &self,
        pending: &mut Vec<PluginDescriptor>,
        resolver: Option<&dyn ServiceResolver>,
    ) -> FlushBatch {
        let mut queue: VecDeque<PluginDescriptor> = pending.drain(..).collect();
        let mut batch = FlushBatch {
            instances: Vec::new(),
            report: FlushReport::default(),
            error: None,
        };

        while let Some(descriptor) = queue.pop_front() {
            match self.instantiate(&descriptor, resolver) {
                Ok(Instantiation::Created {
                    instance,
                    configured,
                }) => {
                    batch.report.loaded.push(LoadedPlugin {
                        plugin_id: instance.plugin_id().to_string(),
                        type_name: descriptor.type_name().to_string(),
                        configured,
                    });
                    batch.instances.push(instance);
                }
                Ok(Instantiation::Skipped(reason)) => {
                    warn!("Skipped plugin type {}: {}", descriptor.type_name(), reason);
                    batch.report.skipped.push(SkippedPlugin {
                        type_name: descriptor.type_name().to_string(),
                        reason,
                    });
                }
                Err(e) => {
                    warn!("Failed to instantiate {}: {}", descriptor.type_name(), e);
                    batch.error = Some(e);
                    break;
                }
            }
        }

        pending.extend(queue);
        if !batch.instances.is_empty() {
            info!("Instantiated {} plugins", batch.instances.len());
        }
        batch
    }
}
