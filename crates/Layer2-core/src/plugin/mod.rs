//! # Plugin System
//!
//! 플러그인 로드 및 조합 서브시스템
//!
//! ## 개요
//!
//! - 타입 소스(명시적 타입, 카탈로그, 매니페스트)에서 후보를 모아 대기열에 쌓고
//! - 첫 capability 조회 시점에 한꺼번에 인스턴스화하며
//! - 타입별 설정 바인딩을 공개 직전에 적용하고
//! - capability 기준 조회, API export, 환경 진단을 제공합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       PluginLoader                          │
//! │                                                             │
//! │  TypeSource ──▶ TypeRegistry (pending)                      │
//! │                      │ flush                                │
//! │                      ▼                                      │
//! │              InstantiationEngine ◀── bindings (when)        │
//! │                      │ publish                              │
//! │                      ▼                                      │
//! │              PluginDirectory ──▶ query / plug / free        │
//! │                 │         │                                 │
//! │                 ▼         ▼                                 │
//! │          ExportTable   DiagnosticsPipeline ──▶ handlers     │
//! │                                                             │
//! │  EventBus (broadcast)                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! #[derive(Default)]
//! struct Greeter;
//!
//! impl Plugin for Greeter {
//!     fn plugin_id(&self) -> &str { "greeter" }
//!     fn plugin_type(&self) -> &str { "api" }
//!     fn declare_capabilities(self: Arc<Self>, caps: &mut CapabilitySet) {
//!         caps.insert::<dyn ApiProvider>(self);
//!     }
//! }
//!
//! impl ApiProvider for Greeter {
//!     fn export_api(&self) -> Vec<ApiExport> {
//!         vec![ApiExport::new::<Greet>(Arc::new(|name: &str| format!("hi {name}")))]
//!     }
//! }
//!
//! let loader = PluginLoader::new();
//! loader.load::<Greeter>();
//! loader.plug_api()?;
//! let greet = loader.use_api::<Greet>()?;
//! ```

mod descriptor;
mod diagnostics;
mod directory;
mod discovery;
mod events;
mod exports;
mod instance;
mod loader;
mod registry;
mod services;
mod traits;

pub use descriptor::{
    CandidateType, DescriptorBuilder, PluginDescriptor, StaticSource, TypeKey, TypeShape,
    TypeSource, Visibility,
};
pub use diagnostics::{
    ConsoleDiagnosticHandler, DiagnosticError, DiagnosticHandler, DiagnosticOutcome,
    DiagnosticReport, DiagnosticStatus, DiagnosticsPipeline, DiagnosticsSummary,
    FnDiagnosticHandler,
};
pub use directory::{PluginDirectory, PluginInstance};
pub use discovery::{manifest_files, ManifestSource, PluginCatalog, PluginManifest};
pub use events::{EventBus, EventType, LoaderEvent};
pub use exports::{ApiExport, ExportTable};
pub use instance::{
    FlushReport, Instantiation, InstantiationEngine, LoadedPlugin, SkipReason, SkippedPlugin,
};
pub use loader::{PlugFailure, PlugReport, PluginLoader};
pub use registry::{DescriptorFilter, TypeRegistry};
pub use services::{
    ServiceCollection, ServiceInstance, ServiceProvider, ServiceResolver, ServiceResolverExt,
};
pub use traits::{ApiProvider, CapabilitySet, ComplementaryPlugin, Plugin, ServicePlugin};
