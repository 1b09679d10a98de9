//! Infrastructure layer - CSV storage and the exchange product collector

pub mod collector;
pub mod storage;
