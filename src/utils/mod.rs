pub mod channel;
pub mod command;
pub mod file;
pub mod notify;
pub mod sketch;
pub mod streams;
pub mod system;
