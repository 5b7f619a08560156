//! Core audit event type.

use crate::Interpretation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource referenced by an audit event.
///
/// The origin is resolved once when the subject is captured and is never
/// re-resolved later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Resource identifier: a path or a synthetic label such as `fd: 7`.
    pub uri: String,
    /// Base the uri is relative to, when it is relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Free-form outcome text (flags, error code).
    pub text: String,
}

impl Subject {
    /// Create an empty subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the uri.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// Replace the origin.
    pub fn set_origin(&mut self, origin: impl Into<String>) {
        self.origin = Some(origin.into());
    }

    /// Replace the outcome text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Builder form of [`Subject::set_uri`].
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.set_uri(uri);
        self
    }

    /// Builder form of [`Subject::set_origin`].
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.set_origin(origin);
        self
    }

    /// Set the origin only when one is available.
    pub fn with_origin_opt(mut self, origin: Option<String>) -> Self {
        if let Some(origin) = origin {
            self.set_origin(origin);
        }
        self
    }

    /// Builder form of [`Subject::set_text`].
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }
}

/// A complete audit record.
///
/// An event without an interpretation is invalid; the sink drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was captured.
    pub timestamp: DateTime<Utc>,
    /// What kind of operation this records.
    pub interpretation: Option<Interpretation>,
    /// Subjects in the order they were added.
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            interpretation: None,
            subjects: Vec::new(),
        }
    }
}

impl Event {
    /// Create an event for the given interpretation, stamped now.
    pub fn new(interpretation: Interpretation) -> Self {
        Self {
            interpretation: Some(interpretation),
            ..Self::default()
        }
    }

    /// Append a subject after any already attached.
    pub fn add_subject(&mut self, subject: Subject) {
        self.subjects.push(subject);
    }

    /// Builder form of [`Event::add_subject`].
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.add_subject(subject);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_keep_insertion_order() {
        let mut event = Event::new(Interpretation::Rename);
        event.add_subject(Subject::new().with_uri("/tmp/a"));
        event.add_subject(Subject::new().with_uri("/tmp/b"));

        let uris: Vec<_> = event.subjects.iter().map(|s| s.uri.as_str()).collect();
        assert_eq!(uris, ["/tmp/a", "/tmp/b"]);
    }

    #[test]
    fn test_setters_replace_previous_values() {
        let mut subject = Subject::new().with_uri("first").with_text("one");
        subject.set_uri("second");
        subject.set_text("two");
        subject.set_origin("/home/u");
        subject.set_origin("fd: 3");

        assert_eq!(subject.uri, "second");
        assert_eq!(subject.text, "two");
        assert_eq!(subject.origin.as_deref(), Some("fd: 3"));
    }

    #[test]
    fn test_origin_opt_skips_none() {
        let subject = Subject::new().with_origin_opt(None);
        assert!(subject.origin.is_none());

        let subject = Subject::new().with_origin_opt(Some("/srv".to_string()));
        assert_eq!(subject.origin.as_deref(), Some("/srv"));
    }
}
