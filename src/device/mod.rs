pub mod btle;
pub mod client;
pub mod constants;
pub mod descriptor;
pub mod gauge;
pub mod mock;
pub mod subscription;
pub mod transport;
pub mod types;
