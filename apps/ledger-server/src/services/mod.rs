//! gRPC service implementations.

pub mod transactions_service;
