pub mod body;
pub mod filter;
pub mod shape;
