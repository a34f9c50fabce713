pub type CourtsideResult<T> = Result<T, CourtsideError>;

/// Error taxonomy for the card pipeline.
///
/// `ImageLoad` and `Persistence` are normally recovered close to where they
/// occur (placeholder substitution, default fallback); they exist as variants
/// so the recovery sites can log a typed error before swallowing it.
#[derive(thiserror::Error, Debug)]
pub enum CourtsideError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("image load error: {0}")]
    ImageLoad(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CourtsideError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn image_load(msg: impl Into<String>) -> Self {
        Self::ImageLoad(msg.into())
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CourtsideError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(CourtsideError::fetch("x").to_string().contains("fetch error:"));
        assert!(
            CourtsideError::image_load("x")
                .to_string()
                .contains("image load error:")
        );
        assert!(
            CourtsideError::export("x")
                .to_string()
                .contains("export error:")
        );
        assert!(
            CourtsideError::persistence("x")
                .to_string()
                .contains("persistence error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CourtsideError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
