//! Constructors for optional scalar leaves.
//!
//! Config literals get noisy fast with `Some("x".to_string())` everywhere;
//! these four helpers build the `Option` leaves for the four scalar shapes
//! the model uses. Reading goes through `Option` itself
//! (`leaf.unwrap_or_default()` when zero-value fallback is wanted).

/// Explicitly-set boolean leaf.
pub fn bool_value(v: bool) -> Option<bool> {
    Some(v)
}

/// Explicitly-set integer leaf.
pub fn int_value<T>(v: T) -> Option<T>
where
    T: Copy + PartialEq,
{
    Some(v)
}

/// Explicitly-set float leaf.
pub fn float_value(v: f64) -> Option<f64> {
    Some(v)
}

/// Explicitly-set string leaf.
pub fn string_value(v: impl Into<String>) -> Option<String> {
    Some(v.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values_are_present() {
        assert_eq!(bool_value(false), Some(false));
        assert_eq!(int_value(0u16), Some(0));
        assert_eq!(float_value(0.0), Some(0.0));
        assert_eq!(string_value(""), Some(String::new()));
    }
}
