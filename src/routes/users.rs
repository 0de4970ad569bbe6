use crate::{error::AppError, middleware::guards::User, models::UserSummary, state::AppState};
use actix_web::{get, web, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
struct UsersResponse {
    users: Vec<UserSummary>,
}

/// GET /users
/// Potential chat partners: everyone except the requester, id and name only.
#[get("/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let users = state.chat.list_other_users(user.id).await?;
    Ok(HttpResponse::Ok().json(UsersResponse { users }))
}
