/*
[INPUT]:  Ally-code endpoint schemas and user-entered ally codes
[OUTPUT]: Ally-code records plus display/validation helpers
[POS]:    Data layer - ally codes for remote and anonymous users
[UPDATE]: When ally-code payloads or display format change
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ALLY_CODE_LEN: usize = 9;

/// Ally code owned by an authenticated user, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyCode {
    pub id: i64,
    pub ally_code: String,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default, deserialize_with = "crate::types::timestamp::deserialize_option")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::types::timestamp::deserialize_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Ally code remembered locally for an anonymous user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAllyCode {
    pub ally_code: String,
    pub player_name: Option<String>,
    #[serde(default, deserialize_with = "crate::types::timestamp::deserialize_option")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyCodeCreate {
    pub ally_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyCodeListResponse {
    pub ally_codes: Vec<AllyCode>,
}

/// Offer to move locally stored codes into a freshly authenticated account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyCodeMigrationPrompt {
    pub show: bool,
    pub local_storage_codes: Vec<String>,
}

/// Handle used to address an ally code.
///
/// Authenticated users address codes by their database id, anonymous users by
/// the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllyCodeRef {
    Id(i64),
    Code(String),
}

impl From<i64> for AllyCodeRef {
    fn from(id: i64) -> Self {
        AllyCodeRef::Id(id)
    }
}

impl From<&str> for AllyCodeRef {
    fn from(code: &str) -> Self {
        AllyCodeRef::Code(code.to_string())
    }
}

impl From<String> for AllyCodeRef {
    fn from(code: String) -> Self {
        AllyCodeRef::Code(code)
    }
}

/// True when `ally_code` is exactly nine ASCII digits.
pub fn is_valid_ally_code(ally_code: &str) -> bool {
    ally_code.len() == ALLY_CODE_LEN && ally_code.bytes().all(|b| b.is_ascii_digit())
}

/// Format an ally code for display as `###-###-###`.
///
/// Anything that is not nine characters long is returned unchanged.
pub fn format_ally_code(ally_code: &str) -> String {
    if ally_code.chars().count() != ALLY_CODE_LEN {
        return ally_code.to_string();
    }
    let chars: Vec<char> = ally_code.chars().collect();
    let groups: Vec<String> = chars.chunks(3).map(|c| c.iter().collect()).collect();
    groups.join("-")
}

/// Strip display dashes (`###-###-###` -> `#########`).
pub fn unformat_ally_code(formatted: &str) -> String {
    formatted.replace('-', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("123456789", "123-456-789")]
    #[case("12345678", "12345678")]
    #[case("", "")]
    #[case("1234567890", "1234567890")]
    fn test_format_ally_code(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_ally_code(input), expected);
    }

    #[rstest]
    #[case("123-456-789", "123456789")]
    #[case("123456789", "123456789")]
    fn test_unformat_ally_code(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unformat_ally_code(input), expected);
    }

    #[rstest]
    #[case("123456789", true)]
    #[case("12345678", false)]
    #[case("12345678a", false)]
    #[case("123-456-789", false)]
    #[case("１２３４５６７８９", false)]
    fn test_is_valid_ally_code(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_ally_code(input), expected);
    }

    #[test]
    fn test_stored_ally_code_roundtrips_null_fields() {
        let raw = r#"{"ally_code":"123456789","player_name":null,"last_used_at":null}"#;
        let parsed: StoredAllyCode = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.ally_code, "123456789");
        assert!(parsed.player_name.is_none());
    }

    #[test]
    fn test_remote_ally_code_accepts_naive_timestamps() {
        let raw = r#"{"id":3,"ally_code":"123456789","last_used_at":"2024-05-01T10:00:00.25"}"#;
        let parsed: AllyCode = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.last_used_at.map(|at| at.to_rfc3339()).as_deref(),
            Some("2024-05-01T10:00:00.250+00:00")
        );
        assert!(parsed.created_at.is_none());
    }
}
