/// Normalizes a user-supplied value by stripping surrounding whitespace
/// and decomposing it into Unicode Normalization Form D.
///
/// ```
/// use roomboard::normalization::normalize_field;
/// assert_eq!(normalize_field(" Boston "), "Boston");
/// ```
pub fn normalize_field(value: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    value.as_ref().trim().nfd().to_string()
}
