pub mod support;

mod config_tests;
mod llm_client_tests;
mod pipeline_tests;
mod reasoning_parser_tests;
