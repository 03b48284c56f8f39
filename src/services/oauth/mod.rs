// Identity provider integrations

pub mod google;
