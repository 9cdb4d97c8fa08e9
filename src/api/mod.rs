pub mod error;
pub mod feedback;
pub mod health;
pub mod incidents;
pub mod openapi;
