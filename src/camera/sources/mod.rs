pub mod directory;
pub mod pattern;
