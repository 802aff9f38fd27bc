pub mod cast;
pub mod check;
