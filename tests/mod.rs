mod api_tests;
mod common;
mod retry_tests;
mod store_tests;
