use serde::de::DeserializeOwned;

/// Parse the JSON document a CLI printed on stdout.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
    let raw = std::str::from_utf8(bytes).map_err(|_| "output is not UTF-8".to_string())?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("no JSON on stdout".to_string());
    }
    serde_json::from_str(trimmed).map_err(|err| err.to_string())
}
