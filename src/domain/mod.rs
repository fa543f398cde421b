pub mod audit;
pub mod fees;
pub mod money;
pub mod ports;
pub mod session;
pub mod vehicle;
pub mod wallet;
