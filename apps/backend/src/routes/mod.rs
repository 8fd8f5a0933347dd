pub mod auth;
pub mod cards;
pub mod documents;
pub mod extract;
pub mod study;
pub mod users;
