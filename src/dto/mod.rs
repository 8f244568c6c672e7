pub mod health;
pub mod room;
pub mod validation;
pub mod ws;
