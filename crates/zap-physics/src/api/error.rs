//! Error types for zap-physics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Space is locked: structural changes are not allowed during a step")]
    SpaceLocked,

    #[error("Invalid {0} handle: entity was removed or belongs to another space")]
    InvalidHandle(&'static str),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

/// Reject NaN and negative values for a named parameter.
pub(crate) fn ensure_non_negative(name: &str, value: crate::math::Real) -> Result<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "{} must be non-negative, got {}",
            name, value
        )))
    }
}

/// Reject NaN, zero and negative values for a named parameter.
pub(crate) fn ensure_positive(name: &str, value: crate::math::Real) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidArgument(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = ensure_positive("mass", -1.0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: mass must be positive, got -1");
        assert!(ensure_non_negative("radius", 0.0).is_ok());
        assert!(ensure_non_negative("radius", crate::math::Real::NAN).is_err());
        let err = PhysicsError::InvalidHandle("body");
        assert!(err.to_string().contains("body"));
    }
}
