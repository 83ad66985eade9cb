pub mod tavily;

pub use tavily::TavilyProvider;
