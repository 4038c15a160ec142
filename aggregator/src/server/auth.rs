//! Bearer token authentication interceptor

use crate::audit::{self, AuthOutcome};
use tonic::{Request, Status};

/// Create a tonic interceptor that validates bearer tokens.
///
/// If `expected_token` is `None`, authentication is disabled and all requests pass.
/// If set, requests must include `authorization: Bearer <token>` metadata.
pub fn make_auth_interceptor(
    expected_token: Option<String>,
) -> impl Fn(Request<()>) -> Result<Request<()>, Status> + Clone {
    move |req: Request<()>| {
        let Some(ref expected) = expected_token else {
            return Ok(req);
        };

        let Some(val) = req.metadata().get("authorization") else {
            audit::grpc_auth(AuthOutcome::MissingHeader);
            return Err(Status::unauthenticated("Missing authorization header"));
        };
        let token = val
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                audit::grpc_auth(AuthOutcome::MalformedHeader);
                Status::unauthenticated("Expected 'Bearer <token>'")
            })?;

        if token == expected.as_str() {
            audit::grpc_auth(AuthOutcome::Accepted);
            Ok(req)
        } else {
            audit::grpc_auth(AuthOutcome::WrongToken);
            Err(Status::unauthenticated("Invalid token"))
        }
    }
}
