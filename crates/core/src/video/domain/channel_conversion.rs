use crate::shared::frame::{is_grayscale, reverse_channels, to_channels, FrameArray};
use crate::video::domain::reset_params::ResetParams;

/// How an undetermined grayscale flag is inferred from the first decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrayscaleProbe {
    /// Decoders that always yield RGB: grayscale when all channels agree.
    EqualChannels,
    /// Stores that keep the true channel count: grayscale when it is 1.
    StoredChannels,
}

/// Post-decode grayscale / channel-order conversion shared by every backend.
///
/// `requested` is what the caller asked for (`None` = detect). `resolved`
/// caches the detected value after the first frame and is cleared by reset.
#[derive(Clone, Debug)]
pub struct ChannelConversion {
    requested: Option<bool>,
    resolved: Option<bool>,
    bgr: bool,
    probe: GrayscaleProbe,
}

impl ChannelConversion {
    pub fn new(grayscale: Option<bool>, bgr: bool, probe: GrayscaleProbe) -> Self {
        Self {
            requested: grayscale,
            resolved: None,
            bgr,
            probe,
        }
    }

    /// The effective grayscale flag, `None` until detected.
    pub fn grayscale(&self) -> Option<bool> {
        self.requested.or(self.resolved)
    }

    pub fn detects_grayscale(&self) -> bool {
        self.requested.is_none()
    }

    pub fn bgr(&self) -> bool {
        self.bgr
    }

    /// Output channel count once the grayscale flag is known.
    pub fn channels(&self) -> Option<usize> {
        self.grayscale().map(|gray| if gray { 1 } else { 3 })
    }

    /// Fixes the grayscale flag from `raw` if it is still undetermined.
    pub fn resolve(&mut self, raw: &FrameArray) -> bool {
        if let Some(gray) = self.grayscale() {
            return gray;
        }
        let gray = match self.probe {
            GrayscaleProbe::EqualChannels => is_grayscale(&raw.view()),
            GrayscaleProbe::StoredChannels => raw.dim().2 == 1,
        };
        self.resolved = Some(gray);
        gray
    }

    /// Fixes the grayscale flag from a channel count known without decoding.
    pub fn resolve_stored(&mut self, stored_channels: usize) -> bool {
        if let Some(gray) = self.grayscale() {
            return gray;
        }
        let gray = stored_channels == 1;
        self.resolved = Some(gray);
        gray
    }

    /// Converts a freshly decoded frame to the configured channel layout.
    pub fn apply(&mut self, raw: FrameArray) -> FrameArray {
        let gray = self.resolve(&raw);
        let frame = to_channels(raw, if gray { 1 } else { 3 });
        if self.bgr {
            reverse_channels(frame)
        } else {
            frame
        }
    }

    /// Applies the conversion part of a reset and forgets any detected value.
    pub fn reset(&mut self, params: &ResetParams) {
        self.requested = params.grayscale;
        self.resolved = None;
        if let Some(bgr) = params.bgr {
            self.bgr = bgr;
        }
    }

    /// Forgets the detected value without changing what was requested.
    pub fn invalidate(&mut self) {
        self.resolved = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn color_frame() -> FrameArray {
        Array3::from_shape_fn((2, 2, 3), |(_, _, c)| (c * 50) as u8)
    }

    fn gray_rgb_frame() -> FrameArray {
        Array3::from_elem((2, 2, 3), 90u8)
    }

    #[test]
    fn test_detects_color_from_equal_channel_probe() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::EqualChannels);
        assert_eq!(conv.channels(), None);
        let out = conv.apply(color_frame());
        assert_eq!(out.dim().2, 3);
        assert_eq!(conv.grayscale(), Some(false));
        assert!(conv.detects_grayscale());
    }

    #[test]
    fn test_detects_gray_from_equal_channel_probe() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::EqualChannels);
        let out = conv.apply(gray_rgb_frame());
        assert_eq!(out.dim().2, 1);
        assert_eq!(conv.channels(), Some(1));
    }

    #[test]
    fn test_stored_channel_probe_keeps_equal_rgb() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::StoredChannels);
        let out = conv.apply(gray_rgb_frame());
        assert_eq!(out.dim().2, 3);
    }

    #[test]
    fn test_detected_value_sticks_across_frames() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::EqualChannels);
        conv.apply(gray_rgb_frame());
        let out = conv.apply(color_frame());
        assert_eq!(out.dim().2, 1);
    }

    #[test]
    fn test_requested_grayscale_overrides_detection() {
        let mut conv = ChannelConversion::new(Some(true), false, GrayscaleProbe::EqualChannels);
        let out = conv.apply(color_frame());
        assert_eq!(out.dim().2, 1);
        assert!(!conv.detects_grayscale());
    }

    #[test]
    fn test_bgr_reverses_channel_order() {
        let mut conv = ChannelConversion::new(Some(false), true, GrayscaleProbe::EqualChannels);
        let out = conv.apply(color_frame());
        assert_eq!(out[[0, 0, 0]], 100);
        assert_eq!(out[[0, 0, 2]], 0);
    }

    #[test]
    fn test_reset_returns_to_detection() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::EqualChannels);
        conv.apply(color_frame());
        conv.reset(&ResetParams::new().with_grayscale(true));
        assert_eq!(conv.grayscale(), Some(true));
        conv.reset(&ResetParams::new().with_bgr(true));
        assert_eq!(conv.grayscale(), None);
        assert!(conv.bgr());
    }

    #[test]
    fn test_resolve_stored_uses_channel_count() {
        let mut conv = ChannelConversion::new(None, false, GrayscaleProbe::StoredChannels);
        assert!(conv.resolve_stored(1));
        assert_eq!(conv.channels(), Some(1));

        let mut conv = ChannelConversion::new(Some(true), false, GrayscaleProbe::StoredChannels);
        assert!(conv.resolve_stored(3));
    }
}
