/// Renders an optional flag for tabular output: `yes`, `no`, or `-` when it wasn't reported.
pub fn yes_no_cell(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

/// Like [`yes_no_cell`] for flags still in their string form; only `true` reads as yes.
pub fn yes_no_str_cell(value: Option<&str>) -> &'static str {
    yes_no_cell(value.map(|v| v.trim().eq_ignore_ascii_case("true")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_flags() {
        assert_eq!(yes_no_str_cell(Some("true")), "yes");
        assert_eq!(yes_no_str_cell(Some("false")), "no");
        assert_eq!(yes_no_str_cell(Some("")), "no");
        assert_eq!(yes_no_str_cell(None), "-");
        assert_eq!(yes_no_cell(Some(true)), "yes");
        assert_eq!(yes_no_cell(Some(false)), "no");
        assert_eq!(yes_no_cell(None), "-");
    }
}
