use salvo::http::{StatusCode, StatusError};
use salvo::oapi::{self, EndpointOutRegister, ToSchema};
use salvo::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("origin {0:?} is not permitted to open a connection")]
    OriginRejected(Option<String>),
    #[error("websocket handshake failed")]
    Handshake(#[from] salvo::Error),
}

impl Scribe for AppError {
    fn render(self, res: &mut Response) {
        let status_error = match self {
            Self::OriginRejected(origin) => {
                tracing::warn!(?origin, "rejected connection from disallowed origin");
                StatusError::forbidden().brief("Origin not permitted")
            }
            Self::Handshake(err) => {
                tracing::error!(error = ?err, "websocket handshake failed");
                StatusError::bad_request().brief("Handshake failed")
            }
        };

        res.render(status_error);
    }
}

impl EndpointOutRegister for AppError {
    fn register(components: &mut oapi::Components, operation: &mut oapi::Operation) {
        let responses = [
            (StatusCode::BAD_REQUEST, "Malformed handshake"),
            (StatusCode::FORBIDDEN, "Origin not permitted"),
        ];

        for (status, description) in responses {
            operation.responses.insert(
                status.as_str(),
                oapi::Response::new(description)
                    .add_content("application/json", StatusError::to_schema(components)),
            );
        }
    }
}
