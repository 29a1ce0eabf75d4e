// Core moderation module - rule storage, the content filter and its
// interchangeable model-backed variant, and word replacements.

pub mod model_moderator;
pub mod moderation_models;
pub mod moderation_service;
pub mod replacements;

pub use model_moderator::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use replacements::apply_replacements;
