pub mod credentials;
pub mod flavours;
pub mod ping;
pub mod token;
