//! Domain types and the ports the transfer engine drives.

pub mod account;
pub mod audit;
pub mod ports;
pub mod transaction;
