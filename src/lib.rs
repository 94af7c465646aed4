#![no_std]

extern crate alloc;

pub mod err;
pub mod fdb;
pub mod mdio;
pub mod mib;
pub mod port;
pub mod psgmii;
pub mod qca8k;
pub mod qm;
pub mod regs;
pub mod vlan;

pub use err::Qca8kError;
pub use qca8k::{Config, Qca8k};
pub use regs::{RegIo, Regmap};
