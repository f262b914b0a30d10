//! Call-control documents returned to the provider.
//!
//! Only the three documents the dialer ever needs exist: bridge to a number
//! with recording, speak a message, and apologise then hang up.

/// Content type the provider expects for call-control documents.
pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Spoken when `To` is not a public-network number.
const NOT_DIALABLE_MESSAGE: &str = "Nummeret kan ikke ringes op fra denne linje.";

/// Spoken when the handler fails internally.
const APOLOGY_MESSAGE: &str = "Beklager, opkaldet kunne ikke gennemføres. Prøv igen senere.";

/// A rendered call-control document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallInstructions {
    /// Bridge the browser leg to `number` with dual-channel recording.
    Dial {
        number: String,
        caller_id: String,
        recording_callback_url: String,
    },
    /// Speak a message; the call ends when the document is exhausted.
    Say { message: String, language: String },
    /// Apologise and end the call explicitly.
    Apology { language: String },
}

impl CallInstructions {
    pub fn dial(
        number: impl Into<String>,
        caller_id: impl Into<String>,
        recording_callback_url: impl Into<String>,
    ) -> Self {
        Self::Dial {
            number: number.into(),
            caller_id: caller_id.into(),
            recording_callback_url: recording_callback_url.into(),
        }
    }

    pub fn not_dialable(language: impl Into<String>) -> Self {
        Self::Say {
            message: NOT_DIALABLE_MESSAGE.to_string(),
            language: language.into(),
        }
    }

    pub fn apology(language: impl Into<String>) -> Self {
        Self::Apology {
            language: language.into(),
        }
    }

    /// Renders the document as XML.
    pub fn to_xml(&self) -> String {
        let body = match self {
            Self::Dial {
                number,
                caller_id,
                recording_callback_url,
            } => format!(
                r#"<Dial callerId="{}" record="record-from-answer-dual" recordingStatusCallback="{}" recordingStatusCallbackMethod="POST" recordingStatusCallbackEvent="completed"><Number>{}</Number></Dial>"#,
                escape_xml(caller_id),
                escape_xml(recording_callback_url),
                escape_xml(number),
            ),
            Self::Say { message, language } => format!(
                r#"<Say language="{}">{}</Say>"#,
                escape_xml(language),
                escape_xml(message),
            ),
            Self::Apology { language } => format!(
                r#"<Say language="{}">{}</Say><Hangup/>"#,
                escape_xml(language),
                escape_xml(APOLOGY_MESSAGE),
            ),
        };
        format!("{XML_DECLARATION}<Response>{body}</Response>")
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_enables_dual_recording_and_callback() {
        let xml = CallInstructions::dial(
            "+4512345678",
            "+4570101010",
            "https://crm.example.dk/api/voice/recording-status",
        )
        .to_xml();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(r#"record="record-from-answer-dual""#));
        assert!(xml.contains(r#"callerId="+4570101010""#));
        assert!(xml.contains(
            r#"recordingStatusCallback="https://crm.example.dk/api/voice/recording-status""#
        ));
        assert!(xml.contains("<Number>+4512345678</Number>"));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn callback_query_string_is_escaped() {
        let xml = CallInstructions::dial("+4512345678", "+4570101010", "https://x.test/cb?a=1&b=2")
            .to_xml();
        assert!(xml.contains("https://x.test/cb?a=1&amp;b=2"));
    }

    #[test]
    fn say_does_not_bridge() {
        let xml = CallInstructions::not_dialable("da-DK").to_xml();
        assert!(xml.contains(r#"<Say language="da-DK">"#));
        assert!(!xml.contains("<Dial"));
    }

    #[test]
    fn apology_hangs_up() {
        let xml = CallInstructions::apology("da-DK").to_xml();
        assert!(xml.contains("<Say"));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }
}
