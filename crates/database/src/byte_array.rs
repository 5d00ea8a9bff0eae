use sqlx::{
    Decode, Encode, Postgres, Type,
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueFormat, PgValueRef},
};

/// Fixed size byte array stored as `bytea`, with the length checked on
/// decode. Used for addresses, transaction hashes and condition ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteArray<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for ByteArray<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> AsRef<[u8]> for ByteArray<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> std::fmt::Display for ByteArray<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl<const N: usize> Type<Postgres> for ByteArray<N> {
    fn type_info() -> PgTypeInfo {
        <[u8] as Type<Postgres>>::type_info()
    }
}

impl<const N: usize> PgHasArrayType for ByteArray<N> {
    fn array_type_info() -> PgTypeInfo {
        <[&[u8]] as Type<Postgres>>::type_info()
    }
}

impl<const N: usize> Decode<'_, Postgres> for ByteArray<N> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        let mut bytes = [0u8; N];
        match value.format() {
            // prepared query
            PgValueFormat::Binary => {
                bytes = value.as_bytes()?.try_into()?;
            }
            // unprepared raw query
            PgValueFormat::Text => {
                let text = value
                    .as_bytes()?
                    .strip_prefix(b"\\x")
                    .ok_or("text does not start with \\x")?;
                hex::decode_to_slice(text, &mut bytes)?
            }
        };
        Ok(Self(bytes))
    }
}

impl<const N: usize> Encode<'_, Postgres> for ByteArray<N> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&[u8] as Encode<Postgres>>::encode(self.0.as_slice(), buf)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        sqlx::{Executor, PgPool, Row},
    };

    #[test]
    fn displays_as_prefixed_hex() {
        assert_eq!(ByteArray([0xde, 0xad, 0xbe, 0xef]).to_string(), "0xdeadbeef");
        assert_eq!(ByteArray::<2>::default().to_string(), "0x0000");
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_round_trips_and_checks_length() {
        const TABLE: &str = "byte_array_test";
        let db = PgPool::connect("postgresql://").await.unwrap();
        db.execute(format!("CREATE TABLE IF NOT EXISTS {TABLE} (bytes bytea);").as_str())
            .await
            .unwrap();
        db.execute(format!("TRUNCATE {TABLE};").as_str())
            .await
            .unwrap();

        let data: ByteArray<3> = ByteArray([1, 2, 3]);
        sqlx::query(&format!("INSERT INTO {TABLE} (bytes) VALUES ($1);"))
            .bind(data)
            .execute(&db)
            .await
            .unwrap();
        let query = format!("SELECT * FROM {TABLE} LIMIT 1;");

        // unprepared raw query
        let row = db.fetch_one(query.as_str()).await.unwrap();
        let data_: ByteArray<3> = row.try_get(0).unwrap();
        assert_eq!(data, data_);

        // prepared query
        let data_: ByteArray<3> = sqlx::query_scalar(&query).fetch_one(&db).await.unwrap();
        assert_eq!(data, data_);

        // wrong sizes error instead of truncating
        let row = db.fetch_one(query.as_str()).await.unwrap();
        assert!(row.try_get::<ByteArray<0>, _>(0).is_err());
        assert!(
            sqlx::query_scalar::<_, ByteArray<4>>(&query)
                .fetch_one(&db)
                .await
                .is_err()
        );
    }
}
