pub mod evaluation;
pub mod message;
pub mod persona;
