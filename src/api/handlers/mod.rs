pub mod health;
pub mod hierarchy;
pub mod programs;
pub mod stats;
