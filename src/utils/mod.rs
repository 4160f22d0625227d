pub mod crypto;
pub mod token;
pub mod upload;
pub mod validation;
