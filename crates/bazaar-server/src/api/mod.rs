//! REST API handlers, one module per resource

pub mod dashboard;
pub mod health;
pub mod message;
pub mod notification;
pub mod payment;
pub mod project;
pub mod route;
pub mod subscription;
