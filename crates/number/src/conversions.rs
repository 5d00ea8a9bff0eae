use {
    alloy_primitives::U256,
    bigdecimal::{
        BigDecimal,
        num_bigint::{BigInt, BigUint, Sign, ToBigInt},
    },
};

pub fn u256_to_big_decimal(value: &U256) -> BigDecimal {
    let big_uint = BigUint::from_bytes_be(&value.to_be_bytes::<32>());
    BigDecimal::from(BigInt::from(big_uint))
}

/// Returns `None` for negative or fractional values and for values that do
/// not fit into 256 bits.
pub fn big_decimal_to_u256(value: &BigDecimal) -> Option<U256> {
    if !value.is_integer() {
        return None;
    }
    let big_int = value.to_bigint()?;
    if big_int.sign() == Sign::Minus {
        return None;
    }
    let (_, bytes) = big_int.to_bytes_be();
    U256::try_from_be_slice(&bytes)
}

/// Lossy conversion used at the scalar boundary. Exact for anything that
/// fits the 53-bit mantissa, nearest double beyond that.
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 2f64.powi(64) + limb as f64)
}
