pub mod api;
pub mod marketplace;
pub mod models;
pub mod notification;
