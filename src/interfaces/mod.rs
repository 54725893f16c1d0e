pub mod gateway;
pub mod scheduler;
