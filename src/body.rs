//! One-shot body helpers.
//!
//! Readers (JSON, XML, raw bytes) turn a malformed body into a `400` [`HttpError`] carrying the
//! decoder's message as details, so handlers can just use `?`:
//!
//! ```rust
//! use httpbox::{handler_fn, read_json, write_json};
//! use http::StatusCode;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize)]
//! struct User { name: String }
//!
//! let create = handler_fn(|w, req| Box::pin(async move {
//!     let user: User = read_json(req.body_reader())?;
//!     write_json(w, StatusCode::CREATED, &user)
//! }));
//! ```

use std::io::{BufReader, Read};

use http::header::CONTENT_TYPE;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, HttpError};
use crate::response::ContentType;
use crate::writer::ResponseWriter;

/// Decodes a JSON value from `r`.
pub fn read_json<T: DeserializeOwned>(r: impl Read) -> Result<T, HttpError> {
    serde_json::from_reader(r).map_err(|e| {
        HttpError::new(StatusCode::BAD_REQUEST, "invalid JSON body").with_details(e.to_string())
    })
}

/// Decodes an XML document from `r`. The root element's name is not checked.
pub fn read_xml<T: DeserializeOwned>(r: impl Read) -> Result<T, HttpError> {
    quick_xml::de::from_reader(BufReader::new(r)).map_err(|e| {
        HttpError::new(StatusCode::BAD_REQUEST, "invalid XML body").with_details(e.to_string())
    })
}

/// Reads `r` to the end.
pub fn read_bytes(mut r: impl Read) -> Result<Vec<u8>, HttpError> {
    let mut data = Vec::new();
    r.read_to_end(&mut data).map_err(|e| {
        HttpError::new(StatusCode::BAD_REQUEST, "unable to read body").with_details(e.to_string())
    })?;
    Ok(data)
}

/// Serializes `value` and sends it as `application/json` with `status`.
///
/// Nothing is written if serialization fails.
pub fn write_json<T: Serialize + ?Sized>(
    w: &mut dyn ResponseWriter,
    status: StatusCode,
    value: &T,
) -> Result<(), Error> {
    let body = serde_json::to_vec(value)?;
    write_bytes(w, status, ContentType::Json, &body)
}

/// Sends `body` with `status` and the given content type.
pub fn write_bytes(
    w: &mut dyn ResponseWriter,
    status: StatusCode,
    content_type: ContentType,
    body: &[u8],
) -> Result<(), Error> {
    w.headers_mut().insert(CONTENT_TYPE, content_type.header_value());
    w.write_header(status);
    w.write_all(body)?;
    Ok(())
}

/// Sends `text` as `text/plain; charset=utf-8`.
pub fn write_text(w: &mut dyn ResponseWriter, status: StatusCode, text: &str) -> Result<(), Error> {
    write_bytes(w, status, ContentType::Text, text.as_bytes())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;

    use serde::Deserialize;

    use super::*;
    use crate::writer::ResponseBuffer;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Person {
        name: String,
        email: String,
        age: u32,
    }

    #[test]
    fn read_json_decodes() {
        let data = r#"{"name":"John","email":"john@example.com","age":30}"#;
        let person: Person = read_json(data.as_bytes()).unwrap();

        assert_eq!(person, Person { name: "John".into(), email: "john@example.com".into(), age: 30 });
    }

    #[test]
    fn read_json_rejects_malformed_input() {
        for data in [r#"{"name":"John","email":}"#, r#"{name:"John"}"#, r#"{"name":"John""#, "this is not JSON"] {
            let err = read_json::<Person>(data.as_bytes()).unwrap_err();

            assert_eq!(err.code(), StatusCode::BAD_REQUEST, "{data}");
            assert_eq!(err.to_string(), "invalid JSON body");
            assert!(err.details().is_some_and(|d| d.is_string()));
        }
    }

    #[test]
    fn read_xml_decodes() {
        let data = "<Person><name>John</name><email>john@example.com</email><age>30</age></Person>";
        let person: Person = read_xml(data.as_bytes()).unwrap();

        assert_eq!(person, Person { name: "John".into(), email: "john@example.com".into(), age: 30 });
    }

    #[test]
    fn read_xml_rejects_malformed_input() {
        for data in [
            "<Person><name>John</name></Person>",
            "<Person><name>John</nam><email>j</email><age>1</age></Person>",
            "this is not XML",
        ] {
            let err = read_xml::<Person>(data.as_bytes()).unwrap_err();

            assert_eq!(err.code(), StatusCode::BAD_REQUEST, "{data}");
            assert_eq!(err.message(), "invalid XML body");
            assert!(err.details().is_some_and(|d| d.is_string()));
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn read_bytes_reads_everything() {
        assert_eq!(read_bytes(&b"raw payload"[..]).unwrap(), b"raw payload");
        assert_eq!(read_bytes(&b""[..]).unwrap(), b"");
    }

    #[test]
    fn read_bytes_failure_is_400() {
        let err = read_bytes(Broken).unwrap_err();

        assert_eq!(err.code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "unable to read body");
        assert_eq!(err.details(), Some(&serde_json::Value::from("reset")));
    }

    #[test]
    fn write_json_sets_type_and_status() {
        let mut w = ResponseBuffer::new();
        write_json(&mut w, StatusCode::CREATED, &serde_json::json!({ "id": 7 })).unwrap();

        assert_eq!(w.status(), StatusCode::CREATED);
        assert_eq!(w.header("content-type"), Some("application/json"));
        assert_eq!(w.text(), r#"{"id":7}"#);
    }

    #[test]
    fn write_json_writes_nothing_on_failure() {
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), 3);

        let mut w = ResponseBuffer::new();
        assert!(write_json(&mut w, StatusCode::OK, &bad).is_err());
        assert!(!w.is_committed());
    }
}
