use et_types::{NullKind, Scalar};

/// Hashable view of a scalar used for trial grouping and value counting.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) enum ScalarKey<'a> {
    Bool(bool),
    Int64(i64),
    FloatBits(u64),
    Utf8(&'a str),
    Null(NullKind),
}

impl<'a> ScalarKey<'a> {
    pub(crate) fn from_scalar(value: &'a Scalar) -> Self {
        match value {
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            Scalar::Float64(v) => Self::FloatBits(if v.is_nan() {
                f64::NAN.to_bits()
            } else if *v == 0.0 {
                0.0_f64.to_bits()
            } else {
                v.to_bits()
            }),
            Scalar::Utf8(v) => Self::Utf8(v.as_str()),
            Scalar::Null(kind) => Self::Null(*kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use et_types::Scalar;

    use super::ScalarKey;

    #[test]
    fn signed_zero_shares_a_key() {
        let pos = Scalar::Float64(0.0);
        let neg = Scalar::Float64(-0.0);
        assert_eq!(ScalarKey::from_scalar(&pos), ScalarKey::from_scalar(&neg));
    }

    #[test]
    fn int_and_text_keys_differ() {
        let int = Scalar::Int64(1);
        let text = Scalar::Utf8("1".into());
        assert_ne!(ScalarKey::from_scalar(&int), ScalarKey::from_scalar(&text));
    }
}
