pub mod support;

mod dispatcher_tests;
mod process_backend_tests;
