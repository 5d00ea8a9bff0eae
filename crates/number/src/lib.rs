pub mod conversions;
pub mod units;
