//! QR capture capability and practice-step payload checking.
//!
//! The device camera / media picker is an interface boundary: something that
//! can yield a decoded string or fail. What the product actually cares about
//! is whether the decoded string is a plausible UPI payment URI, so the QR
//! practice step can grade a scan.

use async_trait::async_trait;

/// An opaque "scan or pick an image, yield a decoded string" capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QrCapture: Send + Sync {
    async fn capture(&self) -> Result<String, CaptureError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture cancelled by the user")]
    Cancelled,
    #[error("no camera or media picker is available")]
    Unavailable,
    #[error("could not decode a QR code: {0}")]
    Decode(String),
}

/// Checks that a decoded QR payload is a plausible UPI payment URI.
///
/// A payable URI starts with `upi://pay?` and carries a non-empty payee
/// address (`pa`) parameter. Anything else fails the practice step.
pub fn verify_upi_payload(decoded: &str) -> bool {
    let Some(query) = decoded.strip_prefix("upi://pay?") else {
        return false;
    };
    query.split('&').any(|pair| {
        match pair.split_once('=') {
            Some(("pa", value)) => !value.is_empty(),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_payment_uri_with_payee_address() {
        assert!(verify_upi_payload(
            "upi://pay?pa=merchant@upi&pn=Tea%20Stall&am=15.00"
        ));
        assert!(verify_upi_payload("upi://pay?am=10&pa=shop@bank"));
    }

    #[test]
    fn rejects_payload_without_payee_address() {
        assert!(!verify_upi_payload("upi://pay?pn=Tea%20Stall&am=15.00"));
        assert!(!verify_upi_payload("upi://pay?pa="));
    }

    #[test]
    fn rejects_non_upi_payloads() {
        assert!(!verify_upi_payload("https://example.com/pay?pa=x@y"));
        assert!(!verify_upi_payload("hello world"));
        assert!(!verify_upi_payload(""));
    }

    #[tokio::test]
    async fn mocked_capture_feeds_verification() {
        let mut capture = MockQrCapture::new();
        capture
            .expect_capture()
            .returning(|| Ok("upi://pay?pa=merchant@upi".to_string()));

        let decoded = capture.capture().await.unwrap();
        assert!(verify_upi_payload(&decoded));
    }

    #[tokio::test]
    async fn cancelled_capture_surfaces_as_error() {
        let mut capture = MockQrCapture::new();
        capture.expect_capture().returning(|| Err(CaptureError::Cancelled));

        assert!(matches!(
            capture.capture().await,
            Err(CaptureError::Cancelled)
        ));
    }
}
