use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),

    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Document of {size} bytes exceeds the maximum document size of {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("Operation '{0}' timed out")]
    Timeout(String),

    #[error("Test not found: {0}")]
    UnknownTest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;

impl BenchError {
    /// Errors that mean the store itself is unusable, as opposed to a single
    /// query failing.
    pub fn is_connection(&self) -> bool {
        match self {
            BenchError::Connection(_) => true,
            BenchError::Mongo(err) => matches!(
                *err.kind,
                mongodb::error::ErrorKind::ServerSelection { .. }
                    | mongodb::error::ErrorKind::Authentication { .. }
                    | mongodb::error::ErrorKind::DnsResolve { .. }
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::Connection("ping failed".to_string());
        assert_eq!(err.to_string(), "Connection error: ping failed");

        let err = BenchError::InvalidQuery("unknown operator $foo".to_string());
        assert_eq!(err.to_string(), "Invalid query: unknown operator $foo");

        let err = BenchError::DocumentTooLarge {
            size: 20_000_000,
            limit: 16_777_216,
        };
        assert_eq!(
            err.to_string(),
            "Document of 20000000 bytes exceeds the maximum document size of 16777216 bytes"
        );

        let err = BenchError::Timeout("find".to_string());
        assert_eq!(err.to_string(), "Operation 'find' timed out");

        let err = BenchError::UnknownTest("NoSuchTest".to_string());
        assert_eq!(err.to_string(), "Test not found: NoSuchTest");
    }

    #[test]
    fn test_connection_classification() {
        assert!(BenchError::Connection("refused".to_string()).is_connection());
        assert!(!BenchError::InvalidQuery("bad".to_string()).is_connection());
        assert!(!BenchError::Timeout("aggregate".to_string()).is_connection());
    }

    #[test]
    fn test_bench_result_type() {
        let ok_result: BenchResult<i32> = Ok(42);
        assert_eq!(ok_result.unwrap(), 42);

        let err_result: BenchResult<i32> = Err(BenchError::UnknownTest("x".to_string()));
        assert!(err_result.is_err());
    }
}
