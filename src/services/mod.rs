pub mod favorites_service;
