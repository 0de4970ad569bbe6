use crate::{
    error::AppError,
    middleware::guards::User,
    models::{ConversationSummary, ConversationView},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
struct ConversationsResponse {
    conversations: Vec<ConversationSummary>,
}

#[derive(Serialize)]
struct ConversationResponse {
    conversation: ConversationView,
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub receiver_id: Uuid,
}

/// GET /conversations
/// The requester's conversations, most recently active first, each with
/// participants, the requester's unread flag and the latest message.
#[get("/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let conversations = state.chat.list_conversations(user.id).await?;
    Ok(HttpResponse::Ok().json(ConversationsResponse { conversations }))
}

/// GET /conversations/{id}
#[get("/conversations/{id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: User,
    conversation_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .chat
        .get_conversation(user.id, conversation_id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ConversationResponse { conversation }))
}

/// POST /conversations
/// Returns the existing conversation with the receiver or creates a new one
/// (with its seed message). Safe to call repeatedly for the same pair.
#[post("/conversations")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .chat
        .create_conversation(user.id, body.receiver_id)
        .await?;
    Ok(HttpResponse::Ok().json(ConversationResponse { conversation }))
}
