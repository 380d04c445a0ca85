pub mod advisor;
pub mod chat;
pub mod error;
pub mod health;
pub mod recommendation;
pub mod widget;

pub use advisor::{CropAdvice, CropAdvisor, WeatherSummary, SOIL_TYPES};
pub use chat::{ChatClient, ChatMessage, Role, FALLBACK_REPLY};
pub use error::{ChatError, ServiceError};
pub use health::Health;
pub use recommendation::{
    GrowingConditions, RawRecommendation, Recommendation, RecommendationClient,
    RecommendationResponse, GENERIC_ADVICE, NO_SPECIFIC_CROP,
};
pub use widget::{
    ChatWidget, EmbeddedChat, HtmlHost, Node, NodeId, Slot, WidgetHost, WidgetSettings,
    CHAT_CONTAINER_ID,
};
