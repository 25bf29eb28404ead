/// Scalar settings kept next to the product table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Highest chat update id already consumed by the ingest phase.
    LastUpdateId,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::LastUpdateId => "last_update_id",
        }
    }
}

/// Reads a stored offset; anything unparsable counts as "nothing processed".
pub fn parse_offset(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(0)
}
