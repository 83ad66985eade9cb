pub mod models;

pub use models::{create_model, GeminiModel, KeywordModel};
