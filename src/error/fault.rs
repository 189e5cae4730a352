//! Translation of fault payloads into typed errors.

use log::debug;
use serde_json::Value;

use super::{FaultError, FaultKind, LbError, Result};
use crate::http::Response;

/// Fault kinds the management API is known to report, keyed by capitalized JSON key.
const FAULT_KINDS: &[(&str, FaultKind)] = &[
    ("ServiceFault", FaultKind::ServiceFault),
    ("LoadBalancerFault", FaultKind::LoadBalancerFault),
    ("ServiceUnavailable", FaultKind::ServiceUnavailable),
    ("Unauthorized", FaultKind::Unauthorized),
    ("BadRequest", FaultKind::BadRequest),
    ("ItemNotFound", FaultKind::ItemNotFound),
    ("OverLimit", FaultKind::OverLimit),
    ("OutOfVirtualIps", FaultKind::OutOfVirtualIps),
    ("ImmutableEntity", FaultKind::ImmutableEntity),
    ("UnprocessableEntity", FaultKind::UnprocessableEntity),
];

/// Turns a non-success response into the matching [`FaultError`].
///
/// Statuses 200 through 209 are not errors and return `Ok(())`. Anything the
/// table does not recognise, including bodies that are not JSON, becomes a
/// [`FaultKind::Other`] fault carrying the status and raw body.
pub fn raise_exception(response: &Response) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    let body = response.text();
    let fault = match parse_fault(response.status, &body) {
        Some(fault) => fault,
        None => {
            debug!(
                "Unrecognised fault payload for status {}, reporting as Other",
                response.status
            );
            FaultError::other(response.status, body)
        }
    };

    Err(LbError::Fault(fault))
}

fn parse_fault(status: u16, body: &str) -> Option<FaultError> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }

    let (key, info) = object.iter().next()?;
    let kind = lookup_kind(key)?;
    let message = info.as_object()?.get("message")?.as_str()?;

    Some(FaultError {
        kind,
        message: message.to_string(),
        status,
        body: body.to_string(),
    })
}

fn lookup_kind(key: &str) -> Option<FaultKind> {
    let name = capitalize(key);
    FAULT_KINDS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault_of(status: u16, body: &str) -> FaultError {
        let response = Response::new(status).with_body(body);
        match raise_exception(&response) {
            Err(LbError::Fault(fault)) => fault,
            other => panic!("Expected a fault, got {:?}", other),
        }
    }

    #[test]
    fn test_success_statuses_are_noop() {
        for status in [200, 201, 202, 204, 209] {
            assert!(raise_exception(&Response::new(status)).is_ok());
        }
    }

    #[test]
    fn test_210_is_not_success() {
        let fault = fault_of(210, "");
        assert_eq!(fault.kind, FaultKind::Other);
    }

    #[test]
    fn test_item_not_found() {
        let fault = fault_of(404, r#"{"itemNotFound": {"message": "no such node"}}"#);
        assert_eq!(fault.kind, FaultKind::ItemNotFound);
        assert_eq!(fault.message, "no such node");
        assert_eq!(fault.status, 404);
        assert!(fault.body.contains("itemNotFound"));
    }

    #[test]
    fn test_every_table_entry_dispatches() {
        for (name, kind) in FAULT_KINDS {
            let mut key = name.to_string();
            key[..1].make_ascii_lowercase();
            let body = format!(r#"{{"{}": {{"message": "m", "code": 400}}}}"#, key);
            assert_eq!(fault_of(400, &body).kind, *kind, "key {}", key);
        }
    }

    #[test]
    fn test_already_capitalized_key() {
        let fault = fault_of(413, r#"{"OverLimit": {"message": "too many"}}"#);
        assert_eq!(fault.kind, FaultKind::OverLimit);
    }

    #[test]
    fn test_unparseable_body_is_other() {
        let fault = fault_of(500, "<html>Internal Error</html>");
        assert_eq!(fault.kind, FaultKind::Other);
        assert!(fault.message.contains("500"));
        assert!(fault.message.contains("<html>Internal Error</html>"));
    }

    #[test]
    fn test_unknown_kind_is_other() {
        let fault = fault_of(400, r#"{"string": {"message": "not a fault"}}"#);
        assert_eq!(fault.kind, FaultKind::Other);
        assert!(fault.message.contains("not a fault"));
    }

    #[test]
    fn test_multiple_keys_is_other() {
        let fault = fault_of(
            400,
            r#"{"badRequest": {"message": "a"}, "overLimit": {"message": "b"}}"#,
        );
        assert_eq!(fault.kind, FaultKind::Other);
    }

    #[test]
    fn test_missing_message_is_other() {
        assert_eq!(fault_of(400, r#"{"badRequest": {"code": 400}}"#).kind, FaultKind::Other);
        assert_eq!(fault_of(400, r#"{"badRequest": "flat"}"#).kind, FaultKind::Other);
        assert_eq!(fault_of(400, "{}").kind, FaultKind::Other);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("itemNotFound"), "ItemNotFound");
        assert_eq!(capitalize(""), "");
    }
}
