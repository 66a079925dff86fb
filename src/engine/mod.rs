pub mod backend;
pub mod engine;
pub mod prompt_builder;
pub mod protocol;
pub mod response_parser;
