//! Logging - tracing 구독자 초기화
//!
//! 호스트 프로세스가 한 번 호출합니다. `RUST_LOG`가 있으면 그 값을 우선합니다.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 전역 tracing 구독자 설치
///
/// 이미 설치된 경우 `false`를 반환합니다 (테스트에서 반복 호출 가능).
pub fn init(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
