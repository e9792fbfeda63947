pub mod arbiter;
pub mod cascade;
pub mod elimination;
pub mod manager;
pub mod partition;
pub mod similarity;
