//! plugcode-core: Plugin runtime for PlugCode
//!
//! Layer2 - 플러그인 로드 및 조합 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 타입 등록, 지연 인스턴스화, 설정 바인딩, capability 조회,
//!   API export, 환경 진단, 로더 이벤트
//!
//! # 사용 예시
//!
//! ```ignore
//! use plugcode_core::{PluginLoader, ServiceCollection, ServicePlugin};
//!
//! let loader = Arc::new(PluginLoader::new());
//! loader.load::<CachePlugin>().load::<AuditPlugin>();
//! loader.add_console_diagnostic(true);
//!
//! // ServicePlugin들이 서비스를 등록
//! let mut services = ServiceCollection::new();
//! services.add_shared(Arc::clone(&loader));
//! loader.configure_services(&mut services)?;
//! let provider = services.build();
//!
//! // 보완 플러그인 연결 + 진단
//! loader.plug_complementary(&provider)?;
//! loader.run_diagnostics(&provider)?;
//! ```

pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    // Capabilities
    ApiProvider,
    // Exports
    ApiExport,
    CandidateType,
    CapabilitySet,
    ComplementaryPlugin,
    // Diagnostics
    ConsoleDiagnosticHandler,
    DiagnosticError,
    DiagnosticHandler,
    DiagnosticReport,
    DiagnosticStatus,
    DiagnosticsSummary,
    // Events
    EventType,
    FlushReport,
    LoaderEvent,
    // Discovery
    ManifestSource,
    PlugReport,
    Plugin,
    PluginCatalog,
    // Descriptors
    PluginDescriptor,
    PluginInstance,
    // Loader
    PluginLoader,
    PluginManifest,
    // Services
    ServiceCollection,
    ServicePlugin,
    ServiceProvider,
    ServiceResolver,
    ServiceResolverExt,
    SkipReason,
    StaticSource,
    TypeSource,
};

// Re-exports: Foundation
pub use plugcode_foundation::{Error, LoaderSettings, Result, SettingsLoader};

/// 크레이트 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
