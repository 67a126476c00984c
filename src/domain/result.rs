//! Result type alias for shadowswap
//!
//! This module provides a convenient Result type alias that uses ReloadError
//! as the error type.

use super::errors::ReloadError;

/// Result type alias for shadowswap operations
///
/// # Examples
///
/// ```
/// use shadowswap::domain::result::Result;
/// use shadowswap::domain::errors::ReloadError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ReloadError::Schema("live table missing".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ReloadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ReloadError;

    #[test]
    fn test_result_ok() {
        let result: Result<i32> = Ok(42);
        assert!(result.is_ok());
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(ReloadError::Other("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
