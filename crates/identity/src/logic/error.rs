use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use thiserror::Error;
use tracing::{error, warn};

use crate::logic::claims::ClaimsError;

/// Failure of a handshake or templating request. Every variant is terminal
/// for the request it occurred in; the browser has to restart at login.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("invalid state parameter")]
    InvalidState,
    #[error("{0}")]
    ProviderDenied(String),
    #[error("response missing authorization code")]
    MissingCode,
    #[error("cannot process OAuth2 code: {0}")]
    ExchangeFailed(#[source] ClaimsError),
    #[error("cannot process OAuth2 code: {0}")]
    EmailDomainRejected(#[source] ClaimsError),
    #[error("cannot process OAuth2 code: {0}")]
    ClaimsRejected(#[source] ClaimsError),
    #[error("cannot parse URL parameter: {0}")]
    ParamDecodeFailed(String),
    #[error("cannot marshal template to YAML")]
    SerializationFailed(#[source] serde_yaml::Error),
    #[error("invalid redirect endpoint: {0}")]
    InvalidRedirect(String),
}

impl AuthFlowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthFlowError::InvalidState
            | AuthFlowError::ProviderDenied(_)
            | AuthFlowError::ExchangeFailed(_)
            | AuthFlowError::EmailDomainRejected(_)
            | AuthFlowError::ClaimsRejected(_) => StatusCode::FORBIDDEN,
            AuthFlowError::MissingCode
            | AuthFlowError::ParamDecodeFailed(_)
            | AuthFlowError::InvalidRedirect(_) => StatusCode::BAD_REQUEST,
            AuthFlowError::SerializationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClaimsError> for AuthFlowError {
    fn from(e: ClaimsError) -> Self {
        match e {
            ClaimsError::EmailDomain { .. } => AuthFlowError::EmailDomainRejected(e),
            ClaimsError::MissingUsername => AuthFlowError::ClaimsRejected(e),
            ClaimsError::Exchange(_) | ClaimsError::MissingIdToken | ClaimsError::Verification(_) => {
                AuthFlowError::ExchangeFailed(e)
            }
        }
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        let cases = [
            (AuthFlowError::InvalidState, StatusCode::FORBIDDEN),
            (
                AuthFlowError::ProviderDenied("access_denied".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (AuthFlowError::MissingCode, StatusCode::BAD_REQUEST),
            (
                AuthFlowError::ExchangeFailed(ClaimsError::MissingIdToken),
                StatusCode::FORBIDDEN,
            ),
            (
                AuthFlowError::EmailDomainRejected(ClaimsError::EmailDomain {
                    expected: "example.org".to_string(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                AuthFlowError::ParamDecodeFailed("email".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AuthFlowError::InvalidRedirect("missing host".to_string()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_claims_errors_map_to_flow_errors() {
        let err: AuthFlowError = ClaimsError::EmailDomain {
            expected: "example.org".to_string(),
        }
        .into();
        assert!(matches!(err, AuthFlowError::EmailDomainRejected(_)));
        assert_eq!(
            err.to_string(),
            "cannot process OAuth2 code: invalid email domain, expecting example.org"
        );

        let err: AuthFlowError = ClaimsError::MissingIdToken.into();
        assert!(matches!(err, AuthFlowError::ExchangeFailed(_)));
        assert_eq!(
            err.to_string(),
            "cannot process OAuth2 code: response missing ID token"
        );

        let err: AuthFlowError = ClaimsError::MissingUsername.into();
        assert!(matches!(err, AuthFlowError::ClaimsRejected(_)));
    }

    #[tokio::test]
    async fn test_into_response_writes_plain_text() {
        let response = AuthFlowError::InvalidState.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"invalid state parameter");
    }

    #[tokio::test]
    async fn test_exchange_failure_body_carries_cause() {
        let err: AuthFlowError =
            ClaimsError::Exchange(anyhow::anyhow!("invalid_grant")).into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            &body[..],
            b"cannot process OAuth2 code: cannot exchange code for token: invalid_grant"
        );
    }
}
