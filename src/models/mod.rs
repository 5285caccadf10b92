pub mod audit;
pub mod lead;
pub mod message;
