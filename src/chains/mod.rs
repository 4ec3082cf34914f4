pub mod evm;
pub mod bitcoin;
