//! Type Registry - 아직 인스턴스화되지 않은 플러그인 타입 대기열
//!
//! 로드 요청은 대기열에만 쌓이고, 실제 인스턴스화는 다음 조회 시점의 flush에서
//! 한꺼번에 일어납니다. `armed` 플래그가 내려가 있으면 조회는 락 없이 지나갑니다.
//! 플러그인 코드는 대기열 락 밖에서 실행되므로, 바인딩 안에서 타입을 더 로드해도 됩니다.

use super::descriptor::{PluginDescriptor, TypeSource};
use parking_lot::{Mutex, ReentrantMutex};
use plugcode_foundation::{Error, Result};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// 소스 필터 (`true`면 대기열에 추가)
pub type DescriptorFilter<'a> = &'a (dyn Fn(&PluginDescriptor) -> bool + Send + Sync);

/// 대기 중인 플러그인 타입 목록
#[derive(Default)]
pub struct TypeRegistry {
    /// 대기열 (삽입 순서 유지, 중복 허용)
    pending: Mutex<Vec<PluginDescriptor>>,

    /// 대기열이 비어 있지 않을 수 있음
    armed: AtomicBool,

    /// flush 직렬화 (같은 스레드 재진입 감지용 플래그 포함)
    flush_gate: ReentrantMutex<Cell<bool>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 타입 하나 추가
    pub fn add(&self, descriptor: PluginDescriptor) {
        debug!("Queued plugin type: {}", descriptor.type_name());
        let mut pending = self.pending.lock();
        pending.push(descriptor);
        self.armed.store(true, Ordering::Release);
    }

    /// 여러 타입 추가 (순서 유지)
    pub fn add_all(&self, descriptors: impl IntoIterator<Item = PluginDescriptor>) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.extend(descriptors);
        let added = pending.len() - before;
        if added > 0 {
            self.armed.store(true, Ordering::Release);
        }
        added
    }

    /// 소스의 후보 중 로드 가능한 타입을 추가
    ///
    /// abstract/hidden/비플러그인 타입은 조용히 제외됩니다.
    /// 소스 해석에 실패하면 아무것도 추가하지 않습니다.
    pub fn add_from_source(
        &self,
        source: &dyn TypeSource,
        filter: Option<DescriptorFilter<'_>>,
    ) -> Result<Vec<PluginDescriptor>> {
        let candidates = source.candidates().map_err(|e| match e {
            Error::SourceResolution { .. } => e,
            other => Error::source_resolution(source.name(), other.to_string()),
        })?;

        let total = candidates.len();
        let accepted: Vec<PluginDescriptor> = candidates
            .iter()
            .filter_map(|candidate| {
                let descriptor = candidate.loadable();
                if descriptor.is_none() {
                    debug!("Ignored candidate {} from {}", candidate.name(), source.name());
                }
                descriptor
            })
            .filter(|descriptor| filter.map_or(true, |accept| accept(*descriptor)))
            .cloned()
            .collect();

        self.add_all(accepted.iter().cloned());
        info!(
            "Merged {} of {} candidates from {}",
            accepted.len(),
            total,
            source.name()
        );
        Ok(accepted)
    }

    /// 대기 중인 타입 수
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// 대기 중인 타입 이름 (삽입 순서)
    pub fn pending_names(&self) -> Vec<&'static str> {
        self.pending
            .lock()
            .iter()
            .map(|descriptor| descriptor.type_name())
            .collect()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// 대기열을 배치 단위로 비우며 `f` 실행
    ///
    /// 대기열 락은 배치를 꺼내는 동안만 잡고, `f`(생성자와 바인딩)는 락 밖에서 돕니다.
    /// `f` 도중 추가된 타입은 같은 flush의 다음 배치로 처리됩니다.
    /// `f`가 `false`를 돌려주면 멈추고, 배치에 남은 항목은 대기열 앞으로 돌아갑니다.
    ///
    /// flush 게이트는 스레드 재진입을 허용합니다. 같은 스레드에서 다시 들어오면
    /// (바인딩 안의 조회 등) 바깥 flush에 맡기고 `None`을 반환하며,
    /// 다른 스레드는 진행 중인 flush가 끝날 때까지 기다립니다.
    pub(crate) fn drain_with<R>(
        &self,
        mut f: impl FnMut(&mut Vec<PluginDescriptor>) -> (R, bool),
    ) -> Option<Vec<R>> {
        if !self.armed.load(Ordering::Acquire) {
            return None;
        }

        let gate = self.flush_gate.lock();
        if gate.get() {
            debug!("Flush already running on this thread, deferring");
            return None;
        }
        let _running = FlushRunning::enter(&gate);

        let mut results = Vec::new();
        loop {
            let mut batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                break;
            }

            let (result, keep_going) = f(&mut batch);
            results.push(result);

            if !batch.is_empty() {
                let mut pending = self.pending.lock();
                batch.append(&mut pending);
                *pending = batch;
            }
            if !keep_going {
                break;
            }
        }

        let pending = self.pending.lock();
        self.armed.store(!pending.is_empty(), Ordering::Release);

        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }
}

/// 현재 스레드에서 flush 진행 중 표시 (패닉 시에도 해제)
struct FlushRunning<'a>(&'a Cell<bool>);

impl<'a> FlushRunning<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlushRunning<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::descriptor::{CandidateType, StaticSource};
    use crate::plugin::traits::Plugin;

    #[derive(Default)]
    struct Alpha;

    impl Plugin for Alpha {
        fn plugin_id(&self) -> &str {
            "alpha"
        }

        fn plugin_type(&self) -> &str {
            "test"
        }
    }

    #[derive(Default)]
    struct Beta;

    impl Plugin for Beta {
        fn plugin_id(&self) -> &str {
            "beta"
        }

        fn plugin_type(&self) -> &str {
            "test"
        }
    }

    struct BrokenSource;

    impl TypeSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn candidates(&self) -> Result<Vec<CandidateType>> {
            Err(Error::Internal("assembly unreadable".into()))
        }
    }

    #[test]
    fn test_fast_path_when_idle() {
        let registry = TypeRegistry::new();
        assert!(!registry.is_armed());
        assert!(registry.drain_with(|_| ((), true)).is_none());
    }

    #[test]
    fn test_add_keeps_order_and_duplicates() {
        let registry = TypeRegistry::new();
        registry.add(PluginDescriptor::of::<Beta>());
        registry.add(PluginDescriptor::of::<Alpha>());
        registry.add(PluginDescriptor::of::<Beta>());

        let names = registry.pending_names();
        assert_eq!(names.len(), 3);
        assert!(names[0].ends_with("Beta"));
        assert!(names[1].ends_with("Alpha"));
        assert!(registry.is_armed());
    }

    #[test]
    fn test_drain_disarms_when_emptied() {
        let registry = TypeRegistry::new();
        registry.add(PluginDescriptor::of::<Alpha>());

        let drained = registry.drain_with(|batch| (batch.drain(..).count(), true));
        assert_eq!(drained, Some(vec![1]));
        assert!(!registry.is_armed());
    }

    #[test]
    fn test_drain_stays_armed_with_leftovers() {
        let registry = TypeRegistry::new();
        registry.add_all([PluginDescriptor::of::<Alpha>(), PluginDescriptor::of::<Beta>()]);

        registry.drain_with(|batch| (batch.remove(0), false));
        assert!(registry.is_armed());
        assert_eq!(registry.pending_len(), 1);
    }

    #[test]
    fn test_additions_during_drain_run_in_next_batch() {
        let registry = TypeRegistry::new();
        registry.add(PluginDescriptor::of::<Alpha>());

        let batches = registry
            .drain_with(|batch| {
                let names: Vec<_> = batch.drain(..).map(|d| d.type_name()).collect();
                // 대기열 락은 잡혀 있지 않음
                if names.iter().any(|name| name.ends_with("Alpha")) {
                    registry.add(PluginDescriptor::of::<Beta>());
                    assert_eq!(registry.pending_len(), 1);
                }
                (names, true)
            })
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert!(batches[1][0].ends_with("Beta"));
        assert!(!registry.is_armed());
    }

    #[test]
    fn test_reentrant_drain_is_deferred() {
        let registry = TypeRegistry::new();
        registry.add(PluginDescriptor::of::<Alpha>());

        let outer = registry.drain_with(|batch| {
            let inner = registry.drain_with(|_| ((), true));
            batch.clear();
            (inner.is_none(), true)
        });

        assert_eq!(outer, Some(vec![true]));
    }

    #[test]
    fn test_leftovers_precede_new_additions() {
        let registry = TypeRegistry::new();
        registry.add_all([PluginDescriptor::of::<Alpha>(), PluginDescriptor::of::<Alpha>()]);

        registry.drain_with(|batch| {
            registry.add(PluginDescriptor::of::<Beta>());
            batch.remove(0);
            ((), false)
        });

        let names = registry.pending_names();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("Alpha"));
        assert!(names[1].ends_with("Beta"));
    }

    #[test]
    fn test_source_skips_unloadable_candidates() {
        let registry = TypeRegistry::new();
        let source = StaticSource::new("assembly")
            .with(CandidateType::plugin(PluginDescriptor::of::<Alpha>()).abstract_type())
            .with(CandidateType::plugin(PluginDescriptor::of::<Alpha>()).hidden())
            .with(CandidateType::other("Helper"))
            .with(CandidateType::plugin(PluginDescriptor::of::<Beta>()));

        let accepted = registry.add_from_source(&source, None).unwrap();
        assert_eq!(accepted.len(), 1);
        assert!(accepted[0].is::<Beta>());
    }

    #[test]
    fn test_source_filter() {
        let registry = TypeRegistry::new();
        let source = StaticSource::new("assembly")
            .with(CandidateType::plugin(PluginDescriptor::of::<Alpha>()))
            .with(CandidateType::plugin(PluginDescriptor::of::<Beta>()));

        let only_beta = |descriptor: &PluginDescriptor| descriptor.is::<Beta>();
        let accepted = registry.add_from_source(&source, Some(&only_beta)).unwrap();

        assert_eq!(accepted.len(), 1);
        assert_eq!(registry.pending_len(), 1);
    }

    #[test]
    fn test_source_failure_adds_nothing() {
        let registry = TypeRegistry::new();
        let err = registry.add_from_source(&BrokenSource, None).unwrap_err();

        assert!(matches!(err, Error::SourceResolution { ref source_name, .. } if source_name == "broken"));
        assert_eq!(registry.pending_len(), 0);
    }
}
