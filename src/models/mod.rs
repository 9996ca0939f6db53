pub mod error;
pub mod health;
pub mod message;
pub mod notification;
pub mod push;
pub mod response;
pub mod retry;
pub mod status;
pub mod template;
pub mod user;
pub mod validation;
