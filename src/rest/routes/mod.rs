pub mod admin;
pub mod auth;
pub mod bills;
pub mod dashboard;
pub mod feedback;
pub mod health;
pub mod learning;
pub mod wizard;
