pub mod email;
pub mod export;
pub mod kubernetes;
pub mod period;
