//! Plugin Directory - 인스턴스화된 플러그인 저장소
//!
//! 로드 순서를 유지하며, 같은 타입의 인스턴스가 여러 개 있을 수 있습니다.
//! 해제된 인스턴스는 폐기 표시되어, 호출자가 쥔 `Arc`로도 플러그인에 닿을 수 없습니다.

use super::descriptor::TypeKey;
use super::traits::{CapabilitySet, Plugin};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// PluginInstance
// ============================================================================

/// 디렉토리에 공개된 플러그인 인스턴스
pub struct PluginInstance {
    instance_id: Uuid,
    plugin_id: String,
    plugin_type: String,
    type_key: TypeKey,
    plugin: Arc<dyn Plugin>,
    concrete: Arc<dyn Any + Send + Sync>,
    capabilities: CapabilitySet,
    load_order: usize,
    live: AtomicBool,
}

impl PluginInstance {
    pub(crate) fn new(
        type_key: TypeKey,
        plugin: Arc<dyn Plugin>,
        concrete: Arc<dyn Any + Send + Sync>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            plugin_id: plugin.plugin_id().to_string(),
            plugin_type: plugin.plugin_type().to_string(),
            type_key,
            plugin,
            concrete,
            capabilities,
            load_order: 0,
            live: AtomicBool::new(true),
        }
    }

    /// 인스턴스 고유 ID (같은 타입의 인스턴스끼리도 다름)
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn plugin_type(&self) -> &str {
        &self.plugin_type
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// 디렉토리 삽입 순서 (1부터)
    pub fn load_order(&self) -> usize {
        self.load_order
    }

    /// 아직 해제되지 않았는지
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// 폐기 표시 후 `on_unload` 호출
    ///
    /// 이미 폐기된 인스턴스면 아무것도 하지 않고 `false`를 반환합니다.
    pub(crate) fn revoke(&self) -> bool {
        if !self.live.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.plugin.on_unload();
        true
    }

    /// 해제된 뒤에는 `None`
    pub fn plugin(&self) -> Option<&Arc<dyn Plugin>> {
        self.is_live().then_some(&self.plugin)
    }

    pub fn capabilities(&self) -> Option<&CapabilitySet> {
        self.is_live().then_some(&self.capabilities)
    }

    pub fn capability<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        if !self.is_live() {
            return None;
        }
        self.capabilities.get::<C>()
    }

    pub fn implements<C: ?Sized + 'static>(&self) -> bool {
        self.is_live() && self.capabilities.contains::<C>()
    }

    /// 구체 타입으로 다운캐스트
    pub fn downcast<T: Plugin>(&self) -> Option<Arc<T>> {
        if !self.is_live() {
            return None;
        }
        Arc::clone(&self.concrete).downcast::<T>().ok()
    }

    pub fn info(&self) -> HashMap<String, String> {
        self.plugin.info()
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("plugin_id", &self.plugin_id)
            .field("type", &self.type_key.name())
            .field("load_order", &self.load_order)
            .field("live", &self.is_live())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

// ============================================================================
// PluginDirectory
// ============================================================================

/// 라이브 인스턴스 디렉토리
///
/// 읽기는 스냅샷을 돌려주므로, 호출자는 락을 잡지 않은 채로 플러그인 코드를 실행합니다.
#[derive(Default)]
pub struct PluginDirectory {
    instances: RwLock<Vec<Arc<PluginInstance>>>,
    load_counter: AtomicUsize,
}

impl PluginDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 인스턴스 공개 (순서 유지)
    pub fn publish(&self, instances: Vec<PluginInstance>) -> Vec<Arc<PluginInstance>> {
        if instances.is_empty() {
            return Vec::new();
        }

        let published: Vec<Arc<PluginInstance>> = instances
            .into_iter()
            .map(|mut instance| {
                instance.load_order = self.load_counter.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    "Published plugin {} (#{})",
                    instance.plugin_id, instance.load_order
                );
                Arc::new(instance)
            })
            .collect();

        self.instances.write().extend(published.iter().cloned());
        published
    }

    /// 전체 스냅샷 (로드 순서)
    pub fn snapshot(&self) -> Vec<Arc<PluginInstance>> {
        self.instances.read().clone()
    }

    /// `C`를 노출하는 인스턴스 (로드 순서)
    pub fn instances_with<C: ?Sized + 'static>(&self) -> Vec<Arc<PluginInstance>> {
        self.instances
            .read()
            .iter()
            .filter(|instance| instance.implements::<C>())
            .cloned()
            .collect()
    }

    /// `C` 핸들 목록 (로드 순서)
    pub fn capabilities<C>(&self) -> Vec<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.instances
            .read()
            .iter()
            .filter_map(|instance| instance.capability::<C>())
            .collect()
    }

    /// 플러그인 ID로 첫 인스턴스 조회
    pub fn get(&self, plugin_id: &str) -> Option<Arc<PluginInstance>> {
        self.instances
            .read()
            .iter()
            .find(|instance| instance.plugin_id() == plugin_id)
            .cloned()
    }

    /// 인스턴스 ID 목록에 해당하는 항목 제거
    pub fn remove(&self, instance_ids: &[Uuid]) -> Vec<Arc<PluginInstance>> {
        if instance_ids.is_empty() {
            return Vec::new();
        }

        let mut instances = self.instances.write();
        let (removed, kept): (Vec<_>, Vec<_>) = instances
            .drain(..)
            .partition(|instance| instance_ids.contains(&instance.instance_id()));
        *instances = kept;
        removed
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::descriptor::PluginDescriptor;

    #[derive(Default)]
    struct Widget;

    impl Plugin for Widget {
        fn plugin_id(&self) -> &str {
            "widget"
        }

        fn plugin_type(&self) -> &str {
            "ui"
        }
    }

    fn widget() -> PluginInstance {
        let descriptor = PluginDescriptor::of::<Widget>();
        let raw = descriptor.factory().construct_default().unwrap();
        descriptor.factory().publish(raw).unwrap()
    }

    #[test]
    fn test_publish_assigns_load_order() {
        let directory = PluginDirectory::new();
        let first = directory.publish(vec![widget(), widget()]);
        let second = directory.publish(vec![widget()]);

        assert_eq!(first[0].load_order(), 1);
        assert_eq!(first[1].load_order(), 2);
        assert_eq!(second[0].load_order(), 3);
        assert_ne!(first[0].instance_id(), first[1].instance_id());
        assert_eq!(directory.len(), 3);
    }

    #[test]
    fn test_capability_query() {
        let directory = PluginDirectory::new();
        directory.publish(vec![widget()]);

        assert_eq!(directory.capabilities::<dyn Plugin>().len(), 1);
        assert_eq!(directory.instances_with::<dyn Plugin>().len(), 1);
        assert!(directory.get("widget").is_some());
        assert!(directory.get("missing").is_none());
    }

    #[test]
    fn test_remove_by_instance_id() {
        let directory = PluginDirectory::new();
        let published = directory.publish(vec![widget(), widget()]);

        let removed = directory.remove(&[published[0].instance_id()]);
        assert_eq!(removed.len(), 1);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.snapshot()[0].instance_id(), published[1].instance_id());
    }

    #[test]
    fn test_revoked_instance_hands_out_nothing() {
        let instance = widget();
        assert!(instance.is_live());
        assert!(instance.capability::<dyn Plugin>().is_some());

        assert!(instance.revoke());
        assert!(!instance.revoke());

        assert!(!instance.is_live());
        assert!(instance.plugin().is_none());
        assert!(instance.capabilities().is_none());
        assert!(instance.capability::<dyn Plugin>().is_none());
        assert!(!instance.implements::<dyn Plugin>());
        assert!(instance.downcast::<Widget>().is_none());
        assert_eq!(instance.plugin_id(), "widget");
    }
}
