pub mod backend_config;
pub mod complexity;
pub mod consistency;
pub mod dependency_graph;
pub mod dispatcher;
pub mod ingest;
pub mod negation;
pub mod orchestrator;
pub mod process_backend;
pub mod result_cache;
