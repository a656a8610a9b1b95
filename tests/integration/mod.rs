mod feeds_integration;
mod pipeline_integration;
