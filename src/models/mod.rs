pub mod kubernetes;
pub mod overtime;
