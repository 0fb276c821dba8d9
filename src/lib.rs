pub mod ai_client;
pub mod db;
pub mod error;
pub mod http_api;
pub mod mindmap;
pub mod settings;
pub mod similarity;
pub mod utils;
