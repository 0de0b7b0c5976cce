use std::collections::BTreeMap;

pub type StringMap = BTreeMap<String, String>;

/// Parses the flattened `key=value; key2=value2` form the search backend uses for labels and
/// annotations.
///
/// Segments without an `=` are skipped, the value is everything after the first `=`, and later
/// duplicates replace earlier ones. Malformed input never fails; it just contributes nothing.
pub fn parse_string_map(s: &str) -> StringMap {
    s.split(';')
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Like [`parse_string_map`], treating an absent string as empty.
pub fn parse_optional_string_map(s: Option<&str>) -> StringMap {
    s.map(parse_string_map).unwrap_or_default()
}
