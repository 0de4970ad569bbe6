use crate::error::AppError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Renders an error as the stable JSON body. Domain errors keep their
/// message; store/config failures collapse to a generic 500 so no internal
/// detail reaches a caller.
pub fn into_response(err: AppError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
        "internal server error".to_string()
    } else {
        err.to_string()
    };

    HttpResponse::build(status).json(ErrorBody {
        code: err.code(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_renders_as_400() {
        let res = into_response(AppError::Validation("message content is required".into()));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_detail_stays_server_side() {
        let res = into_response(AppError::Database("connection refused to 10.0.0.5".into()));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
