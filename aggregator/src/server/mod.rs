//! Network surfaces: gRPC service, auth interceptor, admin HTTP.

pub mod auth;
pub mod grpc;
pub mod http;
