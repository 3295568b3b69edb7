//! Commit metadata carried alongside a diff.

use crate::errors::Result;
use crate::object::{Commit, ObjectId, Signature};
use serde::{Deserialize, Serialize};

/// The `tessera.patch/v1` section of a patch document
///
/// Only `message` is required. Author fields that are absent fall back to
/// the applying user's identity and the current time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchHeader {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    /// ISO-8601 UTC, e.g. `2019-06-20T14:28:33Z`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_time: Option<String>,
    /// `±HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_time_offset: Option<String>,
    /// Commit the diff was generated against; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

impl PatchHeader {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author_name: None,
            author_email: None,
            author_time: None,
            author_time_offset: None,
            base: None,
        }
    }

    /// Header describing `commit`, as emitted by `create-patch`
    pub fn from_commit(commit: &Commit, base: Option<&ObjectId>) -> Self {
        Self {
            message: commit.message.clone(),
            author_name: Some(commit.author.name.clone()),
            author_email: Some(commit.author.email.clone()),
            author_time: Some(commit.author.time_iso8601()),
            author_time_offset: Some(commit.author.offset_string()),
            base: base.map(|id| id.to_string()),
        }
    }

    /// Check that `authorTime` and `authorTimeOffset` parse
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` naming the offending value.
    pub fn validate(&self) -> Result<()> {
        if let Some(time) = &self.author_time {
            Signature::from_iso8601("", "", time, self.author_time_offset.as_deref())?;
        } else if let Some(offset) = &self.author_time_offset {
            crate::object::signature::parse_offset(offset)?;
        }
        Ok(())
    }

    /// Author signature for the commit created from this patch
    ///
    /// Missing identity fields come from `fallback`; a missing time means
    /// "now" in `fallback`'s offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` if the time or offset fails to parse.
    pub fn author(&self, fallback: &Signature) -> Result<Signature> {
        let name = self
            .author_name
            .clone()
            .unwrap_or_else(|| fallback.name.clone());
        let email = self
            .author_email
            .clone()
            .unwrap_or_else(|| fallback.email.clone());

        match &self.author_time {
            Some(time) => {
                Signature::from_iso8601(name, email, time, self.author_time_offset.as_deref())
            }
            None => {
                let offset_minutes = match &self.author_time_offset {
                    Some(text) => crate::object::signature::parse_offset(text)?,
                    None => fallback.offset_minutes,
                };
                Ok(Signature {
                    name,
                    email,
                    time: fallback.time,
                    offset_minutes,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn committer() -> Signature {
        Signature {
            name: "Applier".to_string(),
            email: "applier@example.com".to_string(),
            time: 1_700_000_000,
            offset_minutes: 60,
        }
    }

    #[test]
    fn test_full_header_supplies_author() {
        let header: PatchHeader = serde_json::from_value(json!({
            "message": "Improve naming on Coromandel East coast",
            "authorName": "Robert Coup",
            "authorEmail": "robert@coup.net.nz",
            "authorTime": "2019-06-20T14:28:33Z",
            "authorTimeOffset": "+12:00"
        }))
        .unwrap();
        let author = header.author(&committer()).unwrap();
        assert_eq!(author.name, "Robert Coup");
        assert_eq!(author.time, 1_561_040_913);
        assert_eq!(author.offset_minutes, 720);
    }

    #[test]
    fn test_missing_author_falls_back() {
        let header: PatchHeader = serde_json::from_value(json!({"message": "m"})).unwrap();
        assert_eq!(header.author(&committer()).unwrap(), committer());
    }

    #[test]
    fn test_message_is_required() {
        let result: std::result::Result<PatchHeader, _> =
            serde_json::from_value(json!({"authorName": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_time_rejected() {
        let mut header = PatchHeader::new("m");
        header.author_time = Some("yesterday".to_string());
        assert!(header.author(&committer()).is_err());
    }

    #[test]
    fn test_validate_checks_time_and_offset() {
        let mut header = PatchHeader::new("m");
        assert!(header.validate().is_ok());

        header.author_time_offset = Some("noonish".to_string());
        assert!(header.validate().is_err());

        header.author_time = Some("2019-06-20T14:28:33Z".to_string());
        header.author_time_offset = Some("+12:00".to_string());
        assert!(header.validate().is_ok());

        header.author_time = Some("yesterday-ish".to_string());
        assert!(matches!(
            header.validate(),
            Err(crate::errors::TesseraError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_from_commit_serializes_camel_case() {
        let author = Signature::from_iso8601(
            "A",
            "a@example.com",
            "2019-06-20T14:28:33Z",
            Some("+12:00"),
        )
        .unwrap();
        let commit = Commit {
            tree: ObjectId::for_framed(b"tree"),
            parents: vec![],
            author: author.clone(),
            committer: author,
            message: "msg".to_string(),
        };
        let value = serde_json::to_value(PatchHeader::from_commit(&commit, None)).unwrap();
        assert_eq!(value["authorTime"], "2019-06-20T14:28:33Z");
        assert_eq!(value["authorTimeOffset"], "+12:00");
        assert!(value.get("base").is_none());
    }
}
