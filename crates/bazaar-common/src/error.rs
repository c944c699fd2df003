//! Error types and error codes for Bazaar
//!
//! This module defines:
//! - `BazaarError`: Application-specific error enum
//! - `ErrorCode`: Structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum BazaarError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exist")]
    Conflict(String),

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("feature '{feature}' is not available on the {plan} plan")]
    FeatureNotAvailable { feature: String, plan: String },

    #[error("usage limit reached for '{feature}' ({used}/{limit}) on the {plan} plan")]
    UsageLimitExceeded {
        feature: String,
        plan: String,
        limit: u32,
        used: u32,
    },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const ACCESS_DENIED: ErrorCode<'static> = ErrorCode {
    code: 10001,
    message: "access denied",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

pub const ILLEGAL_STATE: ErrorCode<'static> = ErrorCode {
    code: 23000,
    message: "illegal state",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};

// Subscription gate error codes
pub const FEATURE_NOT_AVAILABLE: ErrorCode<'static> = ErrorCode {
    code: 40100,
    message: "feature not available on current plan",
};

pub const USAGE_LIMIT_EXCEEDED: ErrorCode<'static> = ErrorCode {
    code: 40101,
    message: "usage limit exceeded",
};

pub const PLAN_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 40102,
    message: "plan not found",
};

// Payment error codes
pub const PAYMENT_INTENT_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 40200,
    message: "payment intent not found",
};

pub const PAYMENT_INTENT_STATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 40201,
    message: "payment intent cannot be confirmed in its current state",
};
