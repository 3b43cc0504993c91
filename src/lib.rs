pub mod analyze;
pub mod clean;
pub mod compare;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod table;
