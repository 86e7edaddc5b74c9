/// Broadcast payload builders and publish helpers.
pub mod broadcast_events;
/// Version-checked commits of match mutations.
pub mod concurrency;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Start, finish, end and stoppage commands.
pub mod lifecycle_service;
/// Read projections of a match.
pub mod match_service;
/// Player statistics and derived scores.
pub mod scoring_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// SSE forwarding with heartbeats.
pub mod stream_service;
/// Timeline recording and reads.
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;
