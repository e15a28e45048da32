pub mod favorite_handlers;
pub mod health_handlers;
