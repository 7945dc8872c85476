pub mod decode;
pub mod gmail;
pub mod message;
