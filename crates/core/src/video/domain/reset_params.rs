use std::path::PathBuf;

use crate::shared::error::VideoError;

/// New parameters for [`VideoBackend::reset`](super::video_backend::VideoBackend::reset).
///
/// `grayscale: None` puts the backend back into "detect on first frame"
/// mode; `bgr: None` keeps the current channel order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetParams {
    pub filename: Option<PathBuf>,
    pub filenames: Option<Vec<PathBuf>>,
    pub grayscale: Option<bool>,
    pub bgr: Option<bool>,
}

impl ResetParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_filenames(mut self, filenames: Vec<PathBuf>) -> Self {
        self.filenames = Some(filenames);
        self
    }

    pub fn with_grayscale(mut self, grayscale: bool) -> Self {
        self.grayscale = Some(grayscale);
        self
    }

    pub fn with_bgr(mut self, bgr: bool) -> Self {
        self.bgr = Some(bgr);
        self
    }

    /// Checks the parameters against each other. Backends call this before
    /// touching any state so a rejected reset leaves them unchanged.
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.filename.is_some() && self.filenames.is_some() {
            return Err(VideoError::InvalidArgument(
                "cannot reset with both a filename and a filename list".into(),
            ));
        }
        if matches!(&self.filenames, Some(list) if list.is_empty()) {
            return Err(VideoError::InvalidArgument(
                "filename list must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Rejects a filename list, for backends that are backed by one file.
    pub(crate) fn require_single_file(&self, backend: &str) -> Result<(), VideoError> {
        if self.filenames.is_some() {
            return Err(VideoError::InvalidArgument(format!(
                "{backend} backend does not accept a filename list"
            )));
        }
        Ok(())
    }

    /// Rejects any file reference, for backends with no file behind them.
    pub(crate) fn require_no_files(&self, backend: &str) -> Result<(), VideoError> {
        if self.filename.is_some() || self.filenames.is_some() {
            return Err(VideoError::InvalidArgument(format!(
                "{backend} backend is not backed by a file"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_and_filenames_conflict() {
        let params = ResetParams::new()
            .with_filename("a.png")
            .with_filenames(vec![PathBuf::from("b.png")]);
        assert!(matches!(
            params.validate(),
            Err(VideoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_filename_list_rejected() {
        let params = ResetParams::new().with_filenames(vec![]);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_conversion_only_reset_is_valid() {
        let params = ResetParams::new().with_grayscale(true).with_bgr(false);
        assert!(params.validate().is_ok());
        assert!(params.require_no_files("dummy").is_ok());
    }

    #[test]
    fn test_single_file_backends_reject_lists() {
        let params = ResetParams::new().with_filenames(vec![PathBuf::from("a.png")]);
        assert!(params.require_single_file("media").is_err());
    }
}
