pub mod gemini;
pub mod keyword;

use std::sync::Arc;

use nd_core::{Error, NewsModel, Result};

pub use gemini::GeminiModel;
pub use keyword::KeywordModel;

/// Build a model by name. `api_key` is only consulted by models that need
/// one.
pub fn create_model(name: &str, api_key: Option<String>) -> Result<Arc<dyn NewsModel>> {
    match name {
        "gemini" => Ok(Arc::new(GeminiModel::new(api_key)?)),
        "keyword" => Ok(Arc::new(KeywordModel::new())),
        other => Err(Error::Inference(format!("Unknown model: {}", other))),
    }
}
