use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine as _, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::America::New_York;

use crate::domain::application::DecodedEmail;
use crate::mail::message::{MessagePart, RawMessage};

/// Gmail body data is url-safe base64, sometimes padded and sometimes not.
const BODY_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const RFC2822_OFFSET: &str = "%a, %d %b %Y %H:%M:%S %z";
const RFC2822_NAIVE: &str = "%a, %d %b %Y %H:%M:%S";

/// Flatten a raw message into the fields the extractor cares about.
/// Total by construction: malformed input degrades field by field, it never
/// fails the message.
pub fn decode(msg: &RawMessage) -> DecodedEmail {
    let payload = &msg.payload;
    let date_raw = payload.header("Date");
    DecodedEmail {
        subject: decode_mime_words(&payload.header("Subject")),
        from: decode_mime_words(&payload.header("From")),
        date: normalize_date(&date_raw),
        date_raw,
        body: extract_body(payload),
    }
}

/// RFC 2047 encoded-word decoding. mailparse expects a full "Key: value"
/// header line, so wrap the value in a dummy one.
pub fn decode_mime_words(raw: &str) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw.as_bytes());
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => raw.to_string(),
    }
}

/// Normalize a Date header to America/New_York at minute precision.
///
/// Offset-aware parse first, then offset-naive assumed UTC, then "now" in
/// UTC if the header is hopeless. The trailing " EST" strip mirrors the
/// sheet's historical format; the strftime output never actually carries a
/// zone name, so it only matters if that ever changes.
pub fn normalize_date(raw: &str) -> String {
    let cleaned = raw.replace(" (UTC)", "");

    let parsed: DateTime<Utc> = DateTime::parse_from_str(&cleaned, RFC2822_OFFSET)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&cleaned, RFC2822_NAIVE).map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now());

    parsed
        .with_timezone(&New_York)
        .format("%m/%d/%y %H:%M")
        .to_string()
        .replace(" EST", "")
}

fn decode_part_data(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    let bytes = BODY_B64.decode(data).ok()?;
    String::from_utf8(bytes).ok()
}

/// First non-empty text/plain body: top-level parts first, then one level of
/// nesting (multipart/alternative inside multipart/mixed), then the payload
/// body itself for single-part messages.
fn extract_body(payload: &MessagePart) -> String {
    for part in &payload.parts {
        if part.mime_type == "text/plain" {
            if let Some(text) = decode_part_data(part)
                && !text.is_empty()
            {
                return text;
            }
        } else if !part.parts.is_empty() {
            for sub in &part.parts {
                if sub.mime_type == "text/plain"
                    && let Some(text) = decode_part_data(sub)
                    && !text.is_empty()
                {
                    return text;
                }
            }
        }
    }

    decode_part_data(payload).unwrap_or_default()
}
