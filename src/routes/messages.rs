use crate::{
    error::AppError, middleware::guards::User, models::MessageView, state::AppState,
};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<MessageView>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: MessageView,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// GET /conversations/{id}/messages
/// All messages oldest to newest. Fetching marks the conversation read for
/// the requester.
#[get("/conversations/{id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let messages = state
        .chat
        .list_messages(user.id, conversation_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(MessagesResponse { messages }))
}

/// POST /conversations/{id}/messages
#[post("/conversations/{id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message = state
        .chat
        .send_message(user.id, conversation_id.into_inner(), &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}
