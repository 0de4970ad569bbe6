//! Requester identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in `x-user-id`. Handlers take `User` as a typed argument, so the
//! requester is always an explicit parameter and never ambient state.

use crate::error::AppError;
use actix_web::{Error, FromRequest, HttpRequest};
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of the current request.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok());

        Box::pin(async move {
            let id = user_id.ok_or(AppError::Unauthorized)?;
            Ok(User { id })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_requester_from_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();

        let user = User::extract(&req).await.unwrap();
        assert_eq!(user.id, id);
    }

    #[actix_web::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        let missing = TestRequest::default().to_http_request();
        assert!(User::extract(&missing).await.is_err());

        let malformed = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(User::extract(&malformed).await.is_err());
    }
}
