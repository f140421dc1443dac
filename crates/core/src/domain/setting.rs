use serde::{Deserialize, Serialize};

/// One per-user key/value pair managed through the `store` robot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub user: String,
    pub name: String,
    pub value: String,
}

/// Splits a `NAME=value` assignment, trimming both sides.
///
/// Returns `None` when there is no `=` or the name is blank.
pub fn parse_assignment(raw: &str) -> Option<(String, String)> {
    let (name, value) = raw.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), value.trim().to_owned()))
}
