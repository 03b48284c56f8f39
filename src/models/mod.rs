pub mod identity;
pub mod pass;
