pub mod api;
pub mod avatar;
pub mod events;
pub mod models;
