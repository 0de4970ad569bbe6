pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{
    Conversation, ConversationSummary, ConversationView, MemberConversation, Participant,
};
pub use message::{Message, MessageView};
pub use user::UserSummary;
