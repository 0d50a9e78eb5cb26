//! Types, errors and collaborator traits shared across the bot

pub mod channels;
pub mod errors;
pub mod traits;
pub mod types;
