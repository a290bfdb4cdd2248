//! Kinnect API - HTTP client for the Kinnect backend REST API.
//!
//! This crate provides a typed HTTP client for the chat and friend-request
//! endpoints. It handles bearer-token authentication, timeout management,
//! automatic retry with exponential backoff for transient failures, and
//! multipart media uploads.

pub mod client;
pub mod endpoints;
pub mod response;

// Re-export key types
pub use client::{ApiClient, RetryConfig};
pub use response::{ApiErrorBody, ChatListResponse, ChatResponse, MessageListResponse, MessageResponse, Pagination};
