pub mod fixed;
pub mod track;
