/// Result of fetching a single item from a registry.
///
/// Transient errors are only ever observed between attempts; once the retry
/// budget is exhausted the fetcher reports them as [`FetchOutcome::PermanentError`].
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The request succeeded and produced a usable payload.
    Success(T),

    /// The registry reported that the item does not exist. Never retried.
    NotFound,

    /// A server-side failure, timeout, or dropped connection. Worth retrying.
    TransientError(ohno::AppError),

    /// A client-side error or malformed response. Never retried.
    PermanentError(ohno::AppError),
}

impl<T> FetchOutcome<T> {
    /// Returns `true` if the outcome is `Success`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` if another attempt could change the outcome.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }

    /// Transform the payload of a successful outcome.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Success(data) => FetchOutcome::Success(f(data)),
            Self::NotFound => FetchOutcome::NotFound,
            Self::TransientError(e) => FetchOutcome::TransientError(e),
            Self::PermanentError(e) => FetchOutcome::PermanentError(e),
        }
    }

    /// Chain a further step onto a successful outcome.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> FetchOutcome<U>) -> FetchOutcome<U> {
        match self {
            Self::Success(data) => f(data),
            Self::NotFound => FetchOutcome::NotFound,
            Self::TransientError(e) => FetchOutcome::TransientError(e),
            Self::PermanentError(e) => FetchOutcome::PermanentError(e),
        }
    }

    /// Converts this outcome into a standard `Result`, mapping all non-success variants to errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome is not `Success`.
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            Self::Success(data) => Ok(data),
            Self::NotFound => Err(ohno::app_err!("not found")),
            Self::TransientError(e) | Self::PermanentError(e) => Err(e),
        }
    }

    /// Returns a string describing the status of this outcome.
    #[must_use]
    pub const fn status_str(&self) -> &'static str {
        match self {
            Self::Success(_) => "Success",
            Self::NotFound => "NotFound",
            Self::TransientError(_) => "TransientError",
            Self::PermanentError(_) => "PermanentError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_classification() {
        let outcome: FetchOutcome<u32> = FetchOutcome::NotFound;
        assert!(matches!(outcome.map(|v| v + 1), FetchOutcome::NotFound));

        let outcome = FetchOutcome::Success(41);
        assert!(matches!(outcome.map(|v| v + 1), FetchOutcome::Success(42)));
    }

    #[test]
    fn test_and_then_short_circuits() {
        let outcome: FetchOutcome<u32> = FetchOutcome::PermanentError(ohno::app_err!("bad request"));
        let chained = outcome.and_then(|_| -> FetchOutcome<u32> { panic!("must not run") });
        assert_eq!(chained.status_str(), "PermanentError");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FetchOutcome::<()>::TransientError(ohno::app_err!("503")).is_retryable());
        assert!(!FetchOutcome::<()>::PermanentError(ohno::app_err!("400")).is_retryable());
        assert!(!FetchOutcome::<()>::NotFound.is_retryable());
        assert!(!FetchOutcome::Success(()).is_retryable());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(FetchOutcome::Success(7).into_result().unwrap(), 7);
        let err = FetchOutcome::<u32>::NotFound.into_result().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
