//! Stanza error conditions.
//!
//! Protocol rejections are expressed as RFC 6120 defined conditions; each
//! condition carries its default `type` attribute for the `<error/>` wrapper.

use std::fmt;

/// A defined stanza error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// The request is malformed.
    BadRequest,
    /// The requested resource conflicts with existing state (nickname taken).
    Conflict,
    /// The feature is not implemented by this service.
    FeatureNotImplemented,
    /// The sender lacks the authority for the request.
    Forbidden,
    /// The service hit an unexpected internal fault.
    InternalServerError,
    /// The addressed item (room, occupant) does not exist.
    ItemNotFound,
    /// The addressed JID cannot be processed.
    JidMalformed,
    /// The request is understood but not allowed for this sender.
    NotAllowed,
    /// Credentials (room password) are missing or wrong.
    NotAuthorized,
    /// Membership is required before the request can be honored.
    RegistrationRequired,
    /// The service is not able to serve the request right now.
    ServiceUnavailable,
}

impl Condition {
    /// The defined-condition element name.
    pub fn element_name(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad-request",
            Self::Conflict => "conflict",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::Forbidden => "forbidden",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::JidMalformed => "jid-malformed",
            Self::NotAllowed => "not-allowed",
            Self::NotAuthorized => "not-authorized",
            Self::RegistrationRequired => "registration-required",
            Self::ServiceUnavailable => "service-unavailable",
        }
    }

    /// The default `type` attribute of the wrapping `<error/>` element.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest | Self::JidMalformed => "modify",
            Self::Forbidden | Self::NotAuthorized | Self::RegistrationRequired => "auth",
            Self::Conflict
            | Self::FeatureNotImplemented
            | Self::InternalServerError
            | Self::ItemNotFound
            | Self::NotAllowed
            | Self::ServiceUnavailable => "cancel",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_names_and_types() {
        assert_eq!(Condition::Forbidden.element_name(), "forbidden");
        assert_eq!(Condition::Forbidden.error_type(), "auth");
        assert_eq!(Condition::BadRequest.error_type(), "modify");
        assert_eq!(Condition::ItemNotFound.error_type(), "cancel");
        assert_eq!(Condition::Conflict.to_string(), "conflict");
    }
}
