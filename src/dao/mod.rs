/// Match persistence: the store trait and its memory and MongoDB backends.
pub mod match_store;
/// Domain records shared by every backend.
pub mod models;
/// Backend-agnostic storage errors.
pub mod storage;
