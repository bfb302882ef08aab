pub mod account;
pub mod attempt;
pub mod fee;
pub mod order;
pub mod ports;
