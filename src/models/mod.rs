pub mod combo;
pub mod contract;
pub mod execution;
pub mod leg;
pub mod market_data;
pub mod order;
pub mod ticket;
