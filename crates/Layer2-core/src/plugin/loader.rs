//! Plugin Loader - 플러그인 시스템 컨텍스트
//!
//! 대기열, 바인딩, 디렉토리, export 테이블, 진단 핸들러를 하나로 묶은 명시적 컨텍스트입니다.
//! 전역 상태가 아니므로 호스트가 `Arc<PluginLoader>`로 만들어 필요한 곳에 넘깁니다.
//!
//! ```ignore
//! let loader = PluginLoader::new();
//! loader.load::<CachePlugin>().load::<MetricsPlugin>();
//! loader.when::<CachePlugin, _>(|cache| {
//!     cache.capacity = 512;
//!     Ok(())
//! })?;
//!
//! // 첫 조회 시점에 인스턴스화
//! for provider in loader.query::<dyn ApiProvider>()? { ... }
//! ```

use super::descriptor::{PluginDescriptor, TypeSource};
use super::diagnostics::{
    ConsoleDiagnosticHandler, DiagnosticHandler, DiagnosticReport, DiagnosticStatus,
    DiagnosticsPipeline, DiagnosticsSummary, FnDiagnosticHandler,
};
use super::directory::{PluginDirectory, PluginInstance};
use super::discovery::{manifest_files, ManifestSource, PluginCatalog};
use super::events::{EventBus, LoaderEvent};
use super::exports::{ApiExport, ExportTable};
use super::instance::{FlushReport, InstantiationEngine};
use super::registry::{DescriptorFilter, TypeRegistry};
use super::services::{ServiceCollection, ServiceResolver};
use super::traits::{ApiProvider, ComplementaryPlugin, Plugin, ServicePlugin};
use plugcode_foundation::{Error, LoaderSettings, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// ============================================================================
// PlugReport
// ============================================================================

/// `plug` 중 플러그인이 거부한 연결
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlugFailure {
    pub plugin_id: String,
    pub message: String,
}

/// `plug` 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlugReport {
    /// 액션이 성공한 플러그인 수
    pub connected: usize,

    /// `Error::Plugin`으로 실패한 플러그인 (실행은 계속됨)
    pub failures: Vec<PlugFailure>,
}

// ============================================================================
// PluginLoader
// ============================================================================

/// 플러그인 로더
pub struct PluginLoader {
    /// 아직 인스턴스화되지 않은 타입
    registry: TypeRegistry,

    /// 설정 바인딩 + 생성기
    engine: InstantiationEngine,

    /// 라이브 인스턴스
    directory: PluginDirectory,

    /// API export 테이블
    exports: ExportTable,

    /// 진단 핸들러
    diagnostics: DiagnosticsPipeline,

    /// 로더 이벤트
    events: EventBus,

    /// 주입 팩토리에 넘길 리졸버
    resolver: Option<Arc<dyn ServiceResolver>>,

    /// 로더 설정
    settings: LoaderSettings,
}

impl PluginLoader {
    /// 새 로더 생성
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::new(),
            engine: InstantiationEngine::new(),
            directory: PluginDirectory::new(),
            exports: ExportTable::new(),
            diagnostics: DiagnosticsPipeline::new(),
            events: EventBus::new(),
            resolver: None,
            settings: LoaderSettings::default(),
        }
    }

    /// 설정으로 생성
    ///
    /// `consoleDiagnostics`가 켜져 있으면 콘솔 진단 핸들러를 등록합니다.
    pub fn from_settings(settings: LoaderSettings) -> Self {
        let loader = Self {
            settings,
            ..Self::new()
        };
        if loader.settings.console_diagnostics() {
            loader.add_console_diagnostic(loader.settings.stop_on_failure());
        }
        loader
    }

    /// 주입 팩토리용 리졸버 지정
    pub fn with_resolver(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    // ========================================================================
    // 타입 등록 (지연 로드)
    // ========================================================================

    /// 기본 생성자로 만들 타입 추가
    pub fn load<T: Plugin + Default>(&self) -> &Self {
        self.load_descriptor(PluginDescriptor::of::<T>())
    }

    /// 설정 바인딩과 함께 타입 추가
    pub fn load_with<T, F>(&self, action: F) -> Result<&Self>
    where
        T: Plugin + Default,
        F: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        self.when::<T, F>(action)?;
        Ok(self.load::<T>())
    }

    pub fn load_descriptor(&self, descriptor: PluginDescriptor) -> &Self {
        self.events
            .publish(LoaderEvent::descriptor_queued(descriptor.type_name()));
        self.registry.add(descriptor);
        self
    }

    /// 여러 타입 추가 (순서 유지)
    pub fn load_types(&self, descriptors: impl IntoIterator<Item = PluginDescriptor>) -> &Self {
        let descriptors: Vec<_> = descriptors.into_iter().collect();
        for descriptor in &descriptors {
            self.events
                .publish(LoaderEvent::descriptor_queued(descriptor.type_name()));
        }
        self.registry.add_all(descriptors);
        self
    }

    /// 소스의 로드 가능한 타입 전부 추가
    pub fn load_source(&self, source: &dyn TypeSource) -> Result<usize> {
        self.merge_source(source, None)
    }

    /// 소스의 로드 가능한 타입 중 `filter`를 통과한 것만 추가
    pub fn load_source_filtered(
        &self,
        source: &dyn TypeSource,
        filter: DescriptorFilter<'_>,
    ) -> Result<usize> {
        self.merge_source(source, Some(filter))
    }

    /// 매니페스트 파일 하나를 읽어 추가
    pub fn load_manifest(&self, path: impl AsRef<Path>, catalog: Arc<PluginCatalog>) -> Result<usize> {
        let source = ManifestSource::from_file(path.as_ref(), catalog)?;
        self.merge_source(&source, None)
    }

    /// 디렉토리의 매니페스트를 파일 이름순으로 추가
    ///
    /// 첫 실패에서 멈추며, 그 전에 병합된 소스는 그대로 남습니다.
    pub async fn load_directory(
        &self,
        dir: impl AsRef<Path>,
        catalog: Arc<PluginCatalog>,
        filter: Option<DescriptorFilter<'_>>,
    ) -> Result<usize> {
        let dir = dir.as_ref();
        let files = manifest_files(dir, self.settings.manifest_suffix()).await?;

        let mut total = 0;
        for path in files {
            let source = ManifestSource::read(&path, Arc::clone(&catalog)).await?;
            total += self.merge_source(&source, filter)?;
        }

        info!("Loaded {} plugin types from {:?}", total, dir);
        Ok(total)
    }

    /// 설정의 `pluginDirs`를 순서대로 스캔 (없는 디렉토리는 건너뜀)
    pub async fn load_configured_directories(&self, catalog: Arc<PluginCatalog>) -> Result<usize> {
        let mut total = 0;
        for dir in self.settings.plugin_dirs.clone() {
            let is_dir = tokio::fs::metadata(&dir)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if !is_dir {
                debug!("Plugin directory {:?} does not exist, skipping", dir);
                continue;
            }
            total += self.load_directory(&dir, Arc::clone(&catalog), None).await?;
        }
        Ok(total)
    }

    fn merge_source(&self, source: &dyn TypeSource, filter: Option<DescriptorFilter<'_>>) -> Result<usize> {
        let accepted = self.registry.add_from_source(source, filter)?;
        for descriptor in &accepted {
            self.events
                .publish(LoaderEvent::descriptor_queued(descriptor.type_name()));
        }
        Ok(accepted.len())
    }

    /// 타입 `T`의 설정 바인딩 등록
    ///
    /// `load`보다 먼저든 나중이든 상관없습니다. 바인딩은 인스턴스화 시점에 찾습니다.
    pub fn when<T, F>(&self, action: F) -> Result<&Self>
    where
        T: Plugin,
        F: Fn(&mut T) -> Result<()> + Send + Sync + 'static,
    {
        self.engine.when::<T, F>(action)?;
        Ok(self)
    }

    pub fn has_binding<T: 'static>(&self) -> bool {
        self.engine.has_binding::<T>()
    }

    // ========================================================================
    // Flush
    // ========================================================================

    /// 대기 중인 타입을 모두 인스턴스화
    ///
    /// 조회 메서드가 자동으로 호출하므로 직접 부를 필요는 없습니다.
    /// 실패하면 그 전에 만든 인스턴스는 공개된 채로 남고, 나머지는 다음 flush로 넘어갑니다.
    /// 바인딩이나 생성자 안에서 `load`한 타입은 같은 flush에서 이어서 인스턴스화됩니다.
    pub fn flush(&self) -> Result<FlushReport> {
        let resolver = self.resolver.as_deref();

        // 다른 스레드의 조회는 모든 배치가 공개될 때까지 flush 게이트에서 대기
        let batches = self.registry.drain_with(|batch| {
            let flushed = self.engine.flush(batch, resolver);
            let published = self.directory.publish(flushed.instances);
            let keep_going = flushed.error.is_none();
            ((published, flushed.report, flushed.error), keep_going)
        });

        let Some(batches) = batches else {
            return Ok(FlushReport::default());
        };

        let mut report = FlushReport::default();
        let mut error = None;
        for (published, batch_report, batch_error) in batches {
            for (instance, loaded) in published.iter().zip(&batch_report.loaded) {
                self.events.publish(LoaderEvent::plugin_loaded(
                    instance.plugin_id(),
                    &loaded.type_name,
                    instance.load_order(),
                ));
                if loaded.configured {
                    self.events.publish(LoaderEvent::binding_applied(
                        instance.plugin_id(),
                        &loaded.type_name,
                    ));
                }
            }
            for skipped in &batch_report.skipped {
                self.events.publish(LoaderEvent::plugin_skipped(
                    &skipped.type_name,
                    &skipped.reason.to_string(),
                ));
            }

            report.loaded.extend(batch_report.loaded);
            report.skipped.extend(batch_report.skipped);
            if batch_error.is_some() {
                error = batch_error;
            }
        }

        match error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    // ========================================================================
    // Capability 조회
    // ========================================================================

    /// `C`를 노출하는 플러그인 (로드 순서)
    pub fn query<C>(&self) -> Result<Vec<Arc<C>>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.flush()?;
        Ok(self.directory.capabilities::<C>())
    }

    /// 모든 라이브 인스턴스 (로드 순서)
    pub fn instances(&self) -> Result<Vec<Arc<PluginInstance>>> {
        self.flush()?;
        Ok(self.directory.snapshot())
    }

    /// `C`를 노출하는 인스턴스 (로드 순서)
    pub fn instances_with<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<PluginInstance>>> {
        self.flush()?;
        Ok(self.directory.instances_with::<C>())
    }

    /// 플러그인 ID로 첫 인스턴스 조회
    pub fn get(&self, plugin_id: &str) -> Result<Option<Arc<PluginInstance>>> {
        self.flush()?;
        Ok(self.directory.get(plugin_id))
    }

    pub fn for_each(&self, mut action: impl FnMut(&PluginInstance)) -> Result<()> {
        for instance in self.instances()? {
            action(instance.as_ref());
        }
        Ok(())
    }

    /// `C`를 노출하는 플러그인마다 `action` 실행
    ///
    /// `Error::Plugin`은 해당 플러그인의 실패로 기록하고 계속 진행합니다.
    /// 그 외 에러는 즉시 전파됩니다.
    pub fn plug<C, F>(&self, mut action: F) -> Result<PlugReport>
    where
        C: ?Sized + Send + Sync + 'static,
        F: FnMut(&C) -> Result<()>,
    {
        let mut report = PlugReport::default();

        for instance in self.instances_with::<C>()? {
            let Some(capability) = instance.capability::<C>() else {
                continue;
            };

            match action(capability.as_ref()) {
                Ok(()) => report.connected += 1,
                Err(Error::Plugin(message)) => {
                    warn!("Plugin {} refused connection: {}", instance.plugin_id(), message);
                    report.failures.push(PlugFailure {
                        plugin_id: instance.plugin_id().to_string(),
                        message,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// `(plugin_id, plugin_type, info)` 순회
    pub fn process_info(
        &self,
        mut action: impl FnMut(&str, &str, &HashMap<String, String>),
    ) -> Result<()> {
        for instance in self.instances()? {
            let info = instance.info();
            action(instance.plugin_id(), instance.plugin_type(), &info);
        }
        Ok(())
    }

    /// 라이브 인스턴스 수 (flush하지 않음)
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// 대기 중인 타입 수
    pub fn pending_len(&self) -> usize {
        self.registry.pending_len()
    }

    // ========================================================================
    // 해제
    // ========================================================================

    /// `C`를 노출하는 인스턴스 모두 해제
    pub fn free<C>(&self) -> Result<Vec<Arc<PluginInstance>>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.free_where::<C, _>(|_| true)
    }

    /// `C`를 노출하고 `predicate`를 만족하는 인스턴스 해제
    ///
    /// 디렉토리에서 제거하고 폐기 표시한 뒤 `on_unload`를 호출합니다. 반환된 인스턴스를
    /// 포함해 호출자가 쥔 `PluginInstance`는 더 이상 capability를 내주지 않습니다.
    /// 같은 ID의 인스턴스가 더 남아 있지 않으면 그 플러그인이 제공한 export도 회수합니다.
    pub fn free_where<C, P>(&self, predicate: P) -> Result<Vec<Arc<PluginInstance>>>
    where
        C: ?Sized + Send + Sync + 'static,
        P: Fn(&C) -> bool,
    {
        let targets: Vec<_> = self
            .instances_with::<C>()?
            .into_iter()
            .filter(|instance| {
                instance
                    .capability::<C>()
                    .map_or(false, |capability| predicate(capability.as_ref()))
            })
            .map(|instance| instance.instance_id())
            .collect();

        let removed = self.directory.remove(&targets);
        for instance in &removed {
            if !instance.revoke() {
                continue;
            }

            let retracted = if self.directory.get(instance.plugin_id()).is_none() {
                self.exports.retract(instance.plugin_id())
            } else {
                0
            };

            info!("Freed plugin: {}", instance.plugin_id());
            self.events
                .publish(LoaderEvent::plugin_freed(instance.plugin_id(), retracted));
        }

        Ok(removed)
    }

    // ========================================================================
    // API Export
    // ========================================================================

    /// 모든 `ApiProvider`의 export 수집
    pub fn plug_api(&self) -> Result<usize> {
        let mut total = 0;

        for instance in self.instances_with::<dyn ApiProvider>()? {
            let Some(provider) = instance.capability::<dyn ApiProvider>() else {
                continue;
            };

            let exports: Vec<ApiExport> = provider
                .export_api()
                .into_iter()
                .map(|export| match export.owner() {
                    Some(_) => export,
                    None => export.with_owner(instance.plugin_id()),
                })
                .collect();

            let count = self.exports.extend(exports);
            self.events
                .publish(LoaderEvent::exports_pulled(instance.plugin_id(), count));
            total += count;
        }

        info!("Pulled {} api exports", total);
        Ok(total)
    }

    /// export 직접 추가
    pub fn import_api(&self, export: ApiExport) -> &Self {
        self.exports.import(export);
        self
    }

    /// 시그니처 `S`의 첫 export
    pub fn use_api<S>(&self) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.exports.get::<S>()
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    // ========================================================================
    // 서비스 구성
    // ========================================================================

    /// 모든 `ServicePlugin`에 서비스 수집기 전달
    pub fn configure_services(&self, services: &mut ServiceCollection) -> Result<usize> {
        let plugins = self.query::<dyn ServicePlugin>()?;
        for plugin in &plugins {
            debug!("Configuring services from {}", plugin.plugin_id());
            plugin.configure_services(services);
        }
        Ok(plugins.len())
    }

    /// 모든 `ComplementaryPlugin`에 빌드된 리졸버 전달
    pub fn plug_complementary(&self, resolver: &dyn ServiceResolver) -> Result<usize> {
        let report = self.plug::<dyn ComplementaryPlugin, _>(|plugin| {
            plugin.on_services(resolver);
            Ok(())
        })?;
        Ok(report.connected)
    }

    // ========================================================================
    // 진단
    // ========================================================================

    pub fn add_handler(&self, handler: Arc<dyn DiagnosticHandler>) -> &Self {
        self.diagnostics.add_handler(handler);
        self
    }

    /// 클로저 진단 핸들러 등록
    pub fn add_diagnostic_handler<F>(&self, name: impl Into<String>, handler: F) -> &Self
    where
        F: Fn(&DiagnosticReport) -> Result<()> + Send + Sync + 'static,
    {
        self.add_handler(Arc::new(FnDiagnosticHandler::new(name, handler)))
    }

    /// 콘솔 진단 핸들러 등록
    pub fn add_console_diagnostic(&self, stop_on_failure: bool) -> &Self {
        self.add_handler(Arc::new(ConsoleDiagnosticHandler::new(stop_on_failure)))
    }

    /// 모든 라이브 플러그인 진단
    ///
    /// 핸들러 에러나 플러그인 진단 에러가 나면 즉시 중단하고 전파합니다.
    pub fn run_diagnostics(&self, resolver: &dyn ServiceResolver) -> Result<DiagnosticsSummary> {
        let mut summary = DiagnosticsSummary::default();

        for instance in self.instances()? {
            // 스냅샷 이후 해제된 인스턴스
            let Some(plugin) = instance.plugin() else {
                continue;
            };
            let outcome = self.diagnostics.diagnose(plugin.as_ref(), resolver)?;
            if let DiagnosticStatus::Reported(report) = &outcome.status {
                self.events.publish(LoaderEvent::diagnostic_reported(
                    &outcome.plugin_id,
                    report.success,
                ));
            }
            summary.outcomes.push(outcome);
        }

        info!(
            "Diagnostics finished: {} plugins, {} failed",
            summary.outcomes.len(),
            summary.failed()
        );
        Ok(summary)
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
