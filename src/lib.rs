pub mod api;
pub mod data_collector;
pub mod database;
pub mod fundamentals;
pub mod maintenance;
pub mod models;
pub mod thirteen_f;
pub mod utils;
