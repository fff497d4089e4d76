/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Game-post lifecycle orchestration.
pub mod post_service;
/// Storage reconnect loop with degraded mode.
pub mod storage_supervisor;
