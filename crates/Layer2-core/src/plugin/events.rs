//! Loader Events - 로더 수명주기 이벤트
//!
//! 로더는 동기 API이므로 발행도 동기입니다. 구독자는 tokio broadcast 채널로 받습니다.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::trace;

// ============================================================================
// LoaderEvent
// ============================================================================

/// 로더 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderEvent {
    /// 이벤트 타입
    pub event_type: EventType,

    /// 이벤트 데이터
    pub data: Value,

    /// 타임스탬프
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LoaderEvent {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn descriptor_queued(type_name: &str) -> Self {
        Self::new(
            EventType::DescriptorQueued,
            serde_json::json!({ "type": type_name }),
        )
    }

    pub fn plugin_loaded(plugin_id: &str, type_name: &str, load_order: usize) -> Self {
        Self::new(
            EventType::PluginLoaded,
            serde_json::json!({
                "plugin_id": plugin_id,
                "type": type_name,
                "load_order": load_order,
            }),
        )
    }

    pub fn plugin_skipped(type_name: &str, reason: &str) -> Self {
        Self::new(
            EventType::PluginSkipped,
            serde_json::json!({ "type": type_name, "reason": reason }),
        )
    }

    pub fn binding_applied(plugin_id: &str, type_name: &str) -> Self {
        Self::new(
            EventType::BindingApplied,
            serde_json::json!({ "plugin_id": plugin_id, "type": type_name }),
        )
    }

    pub fn plugin_freed(plugin_id: &str, exports_retracted: usize) -> Self {
        Self::new(
            EventType::PluginFreed,
            serde_json::json!({
                "plugin_id": plugin_id,
                "exports_retracted": exports_retracted,
            }),
        )
    }

    pub fn exports_pulled(plugin_id: &str, count: usize) -> Self {
        Self::new(
            EventType::ExportsPulled,
            serde_json::json!({ "plugin_id": plugin_id, "count": count }),
        )
    }

    pub fn diagnostic_reported(plugin_id: &str, success: bool) -> Self {
        Self::new(
            EventType::DiagnosticReported,
            serde_json::json!({ "plugin_id": plugin_id, "success": success }),
        )
    }

    /// 데이터의 `plugin_id` 필드
    pub fn plugin_id(&self) -> Option<&str> {
        self.data.get("plugin_id").and_then(Value::as_str)
    }
}

/// 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DescriptorQueued,
    PluginLoaded,
    PluginSkipped,
    BindingApplied,
    PluginFreed,
    ExportsPulled,
    DiagnosticReported,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DescriptorQueued => write!(f, "descriptor_queued"),
            Self::PluginLoaded => write!(f, "plugin_loaded"),
            Self::PluginSkipped => write!(f, "plugin_skipped"),
            Self::BindingApplied => write!(f, "binding_applied"),
            Self::PluginFreed => write!(f, "plugin_freed"),
            Self::ExportsPulled => write!(f, "exports_pulled"),
            Self::DiagnosticReported => write!(f, "diagnostic_reported"),
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 - 발행 및 최근 이력 보관
pub struct EventBus {
    /// 브로드캐스트 채널 발신자
    sender: broadcast::Sender<LoaderEvent>,

    /// 이벤트 히스토리 (최근 N개)
    history: RwLock<VecDeque<LoaderEvent>>,

    /// 히스토리 최대 크기
    history_size: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024, 100)
    }

    pub fn with_capacity(channel_capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            sender,
            history: RwLock::new(VecDeque::with_capacity(history_size)),
            history_size,
        }
    }

    /// 이벤트 발행
    pub fn publish(&self, event: LoaderEvent) {
        trace!("Publishing event: {}", event.event_type);

        if self.history_size > 0 {
            let mut history = self.history.write();
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.sender.subscribe()
    }

    pub fn history(&self) -> Vec<LoaderEvent> {
        self.history.read().iter().cloned().collect()
    }

    pub fn history_by_type(&self, event_type: EventType) -> Vec<LoaderEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let bus = EventBus::with_capacity(16, 2);
        bus.publish(LoaderEvent::descriptor_queued("A"));
        bus.publish(LoaderEvent::descriptor_queued("B"));
        bus.publish(LoaderEvent::plugin_loaded("c", "C", 1));

        let history = bus.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].event_type, EventType::PluginLoaded);
        assert_eq!(bus.history_by_type(EventType::DescriptorQueued).len(), 1);
    }

    #[tokio::test]
    async fn test_event_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(LoaderEvent::plugin_freed("db", 2));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::PluginFreed);
        assert_eq!(event.plugin_id(), Some("db"));
        assert_eq!(event.data["exports_retracted"], 2);
    }

    #[test]
    fn test_event_serialization() {
        let event = LoaderEvent::plugin_skipped("Abstract", "no_default_constructor");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"plugin_skipped\""));
    }
}
