//! Plugin Diagnostics - 환경 자가 진단 및 리포트 핸들러

use super::services::ServiceResolver;
use super::traits::Plugin;
use plugcode_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

// ============================================================================
// DiagnosticReport
// ============================================================================

/// 플러그인 하나의 진단 결과 (실행마다 새로 생성, 저장하지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// 플러그인 식별자
    pub plugin: String,

    /// 성공 여부
    pub success: bool,

    /// 경고 메시지 (순서 유지)
    pub warnings: Vec<String>,

    /// 에러 메시지 (순서 유지)
    pub errors: Vec<String>,
}

impl DiagnosticReport {
    pub fn new(plugin: impl Into<String>, success: bool) -> Self {
        Self {
            plugin: plugin.into(),
            success,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// 성공 리포트
    pub fn ok(plugin: impl Into<String>) -> Self {
        Self::new(plugin, true)
    }

    /// 실패 리포트
    pub fn failed(plugin: impl Into<String>) -> Self {
        Self::new(plugin, false)
    }

    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    /// 에러 추가 (성공 여부는 바꾸지 않음)
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }
}

/// 플러그인 진단 호출의 실패
#[derive(ThisError, Debug)]
pub enum DiagnosticError {
    /// 진단을 제공하지 않는 플러그인 (무시됨)
    #[error("environment diagnostic not implemented")]
    NotImplemented,

    /// 진단 도중 발생한 에러 (호출자에게 전파)
    #[error(transparent)]
    Failed(#[from] Error),
}

// ============================================================================
// DiagnosticHandler
// ============================================================================

/// 진단 리포트 핸들러
///
/// 등록 순서대로 동기 호출됩니다. 에러를 반환하면 진단 실행이 중단됩니다.
pub trait DiagnosticHandler: Send + Sync {
    fn name(&self) -> &str {
        "handler"
    }

    fn handle(&self, report: &DiagnosticReport) -> Result<()>;
}

/// 클로저 기반 핸들러
pub struct FnDiagnosticHandler<F> {
    name: String,
    handler: F,
}

impl<F> FnDiagnosticHandler<F>
where
    F: Fn(&DiagnosticReport) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> DiagnosticHandler for FnDiagnosticHandler<F>
where
    F: Fn(&DiagnosticReport) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, report: &DiagnosticReport) -> Result<()> {
        (self.handler)(report)
    }
}

/// 콘솔(tracing) 진단 핸들러
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleDiagnosticHandler {
    stop_on_failure: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(stop_on_failure: bool) -> Self {
        Self { stop_on_failure }
    }

    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn name(&self) -> &str {
        "console"
    }

    fn handle(&self, report: &DiagnosticReport) -> Result<()> {
        for warning in &report.warnings {
            warn!("[{}] {}", report.plugin, warning);
        }
        for error in &report.errors {
            warn!("[{}] {}", report.plugin, error);
        }

        if report.success {
            info!("Plugin {} diagnostic passed", report.plugin);
            return Ok(());
        }

        if self.stop_on_failure {
            return Err(Error::PluginDiagnostic(report.plugin.clone()));
        }

        warn!(
            "The plugin {} diagnostic environment is not success",
            report.plugin
        );
        Ok(())
    }
}

// ============================================================================
// DiagnosticsPipeline
// ============================================================================

/// 플러그인별 진단 상태
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticStatus {
    /// 리포트가 생성되어 모든 핸들러에 전달됨
    Reported(DiagnosticReport),
    /// 플러그인이 진단을 제공하지 않음
    NotImplemented,
}

/// 플러그인별 진단 결과
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticOutcome {
    pub plugin_id: String,
    pub status: DiagnosticStatus,
}

/// 진단 실행 요약
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticsSummary {
    pub outcomes: Vec<DiagnosticOutcome>,
}

impl DiagnosticsSummary {
    pub fn reports(&self) -> impl Iterator<Item = &DiagnosticReport> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            DiagnosticStatus::Reported(report) => Some(report),
            DiagnosticStatus::NotImplemented => None,
        })
    }

    pub fn failed(&self) -> usize {
        self.reports().filter(|report| !report.success).count()
    }

    pub fn not_implemented(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == DiagnosticStatus::NotImplemented)
            .count()
    }
}

/// 진단 실행기
///
/// 핸들러 목록을 보관하고, 주어진 플러그인들에 대해 진단을 돌립니다.
#[derive(Default)]
pub struct DiagnosticsPipeline {
    handlers: parking_lot::RwLock<Vec<Arc<dyn DiagnosticHandler>>>,
}

impl DiagnosticsPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn DiagnosticHandler>) {
        debug!("Registered diagnostic handler: {}", handler.name());
        self.handlers.write().push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// 플러그인 하나 진단
    ///
    /// 핸들러 에러는 즉시 전파되며, 그 뒤의 핸들러는 호출되지 않습니다.
    pub fn diagnose(
        &self,
        plugin: &dyn Plugin,
        resolver: &dyn ServiceResolver,
    ) -> Result<DiagnosticOutcome> {
        let plugin_id = plugin.plugin_id().to_string();

        let report = match plugin.environment_diagnostic(resolver) {
            Ok(report) => report,
            Err(DiagnosticError::NotImplemented) => {
                debug!("Plugin {} has no environment diagnostic", plugin_id);
                return Ok(DiagnosticOutcome {
                    plugin_id,
                    status: DiagnosticStatus::NotImplemented,
                });
            }
            Err(DiagnosticError::Failed(e)) => return Err(e),
        };

        // 핸들러 호출 중에는 락을 잡지 않음
        let handlers: Vec<_> = self.handlers.read().iter().cloned().collect();
        for handler in handlers {
            handler.handle(&report)?;
        }

        Ok(DiagnosticOutcome {
            plugin_id,
            status: DiagnosticStatus::Reported(report),
        })
    }

    /// 여러 플러그인을 순서대로 진단
    pub fn run(
        &self,
        plugins: &[Arc<dyn Plugin>],
        resolver: &dyn ServiceResolver,
    ) -> Result<DiagnosticsSummary> {
        let mut summary = DiagnosticsSummary::default();
        for plugin in plugins {
            summary.outcomes.push(self.diagnose(plugin.as_ref(), resolver)?);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::services::ServiceProvider;
    use parking_lot::Mutex;

    struct Probe {
        id: &'static str,
        healthy: Option<bool>,
    }

    impl Plugin for Probe {
        fn plugin_id(&self) -> &str {
            self.id
        }

        fn plugin_type(&self) -> &str {
            "probe"
        }

        fn environment_diagnostic(
            &self,
            _resolver: &dyn ServiceResolver,
        ) -> std::result::Result<DiagnosticReport, DiagnosticError> {
            match self.healthy {
                Some(true) => Ok(DiagnosticReport::ok(self.id)),
                Some(false) => Ok(DiagnosticReport::failed(self.id).with_error("unreachable")),
                None => Err(DiagnosticError::NotImplemented),
            }
        }
    }

    fn recorder(seen: Arc<Mutex<Vec<String>>>) -> Arc<dyn DiagnosticHandler> {
        Arc::new(FnDiagnosticHandler::new("recorder", move |report: &DiagnosticReport| {
            seen.lock().push(report.plugin.clone());
            Ok(())
        }))
    }

    #[test]
    fn test_not_implemented_is_swallowed() {
        let pipeline = DiagnosticsPipeline::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline.add_handler(recorder(Arc::clone(&seen)));

        let plugin = Probe { id: "silent", healthy: None };
        let outcome = pipeline.diagnose(&plugin, &ServiceProvider::empty()).unwrap();

        assert_eq!(outcome.status, DiagnosticStatus::NotImplemented);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_console_handler_continue() {
        let handler = ConsoleDiagnosticHandler::new(false);
        let report = DiagnosticReport::failed("db").with_warning("slow");
        assert!(handler.handle(&report).is_ok());
    }

    #[test]
    fn test_console_handler_stop() {
        let handler = ConsoleDiagnosticHandler::new(true);
        assert!(handler.handle(&DiagnosticReport::ok("db")).is_ok());

        let err = handler.handle(&DiagnosticReport::failed("db")).unwrap_err();
        assert!(matches!(err, Error::PluginDiagnostic(id) if id == "db"));
    }

    #[test]
    fn test_run_collects_summary() {
        let pipeline = DiagnosticsPipeline::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        pipeline.add_handler(recorder(Arc::clone(&seen)));
        pipeline.add_handler(Arc::new(ConsoleDiagnosticHandler::new(false)));

        let plugins: Vec<Arc<dyn Plugin>> = vec![
            Arc::new(Probe { id: "a", healthy: Some(true) }),
            Arc::new(Probe { id: "b", healthy: None }),
            Arc::new(Probe { id: "c", healthy: Some(false) }),
        ];

        let summary = pipeline.run(&plugins, &ServiceProvider::empty()).unwrap();

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.not_implemented(), 1);
        assert_eq!(*seen.lock(), vec!["a".to_string(), "c".to_string()]);
    }
}
