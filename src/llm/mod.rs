pub mod extract;
pub mod gemini;
