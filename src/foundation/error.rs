pub type StoreshotResult<T> = Result<T, StoreshotError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreshotError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("export already in progress")]
    Busy,

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreshotError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn quota(msg: impl Into<String>) -> Self {
        Self::Quota(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for StoreshotError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            StoreshotError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            StoreshotError::decode("x")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            StoreshotError::storage("x")
                .to_string()
                .contains("storage error:")
        );
        assert!(
            StoreshotError::quota("x")
                .to_string()
                .contains("quota exceeded:")
        );
        assert!(
            StoreshotError::invariant("x")
                .to_string()
                .contains("invariant violation:")
        );
        assert!(
            StoreshotError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert_eq!(
            StoreshotError::Busy.to_string(),
            "export already in progress"
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = StoreshotError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn json_errors_map_to_serde() {
        let err: StoreshotError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StoreshotError::Serde(_)));
    }
}
