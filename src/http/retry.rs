//! Classification of reqwest failures into reset-class and fatal transport errors.

use std::error::Error as StdError;
use std::io;

use super::{TransportError, TransportErrorKind};

/// Hyper reports a peer that hangs up mid-exchange with this message and no io error.
const INCOMPLETE_MESSAGE: &str = "connection closed before message completed";

/// Returns true for io error kinds that mean the server dropped the connection.
pub fn is_reset_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::InvalidInput
    )
}

/// Maps a reqwest error onto a [`TransportError`], walking the source chain
/// to find the underlying io failure.
pub fn classify_error(error: reqwest::Error) -> TransportError {
    let kind = if is_connection_drop(&error) {
        TransportErrorKind::Reset
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, describe(&error))
}

fn is_connection_drop(error: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(error);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_reset_kind(io_err.kind()) {
                return true;
            }
        }
        if err.to_string().contains(INCOMPLETE_MESSAGE) {
            return true;
        }
        source = err.source();
    }
    false
}

/// Joins the error and its sources, since reqwest's top-level message is terse.
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = err.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_reset_kinds() {
        assert!(is_reset_kind(io::ErrorKind::ConnectionReset));
        assert!(is_reset_kind(io::ErrorKind::BrokenPipe));
        assert!(is_reset_kind(io::ErrorKind::UnexpectedEof));
        assert!(is_reset_kind(io::ErrorKind::InvalidInput));
    }

    #[test]
    fn test_non_reset_kinds() {
        assert!(!is_reset_kind(io::ErrorKind::ConnectionRefused));
        assert!(!is_reset_kind(io::ErrorKind::TimedOut));
        assert!(!is_reset_kind(io::ErrorKind::NotFound));
    }

    #[test]
    fn test_connection_drop_in_source_chain() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(is_connection_drop(&io_err));

        let io_err = io::Error::new(io::ErrorKind::Other, INCOMPLETE_MESSAGE);
        assert!(is_connection_drop(&io_err));

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(!is_connection_drop(&io_err));
    }

    #[tokio::test]
    async fn test_classify_dropped_connection_as_reset() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let err = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();

        let classified = classify_error(err);
        assert_eq!(classified.kind, TransportErrorKind::Reset);
    }

    #[tokio::test]
    async fn test_classify_refused_connection_as_other() {
        // Bind then drop to get a port with nothing listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();

        let classified = classify_error(err);
        assert_eq!(classified.kind, TransportErrorKind::Other);
        assert!(!classified.message.is_empty());
    }
}
