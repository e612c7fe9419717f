pub mod api;
pub mod cli;
pub mod core;
pub mod eval;
pub mod openai;
pub mod pipeline;
pub mod render;
pub mod search;
pub mod session;
