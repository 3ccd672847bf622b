//! Login popup geometry and window features.

use crate::host::ScreenSize;

/// Name given to login windows and tabs.
pub const LOGIN_WINDOW_NAME: &str = "Sign in to Elixir";

/// Default login popup width in pixels.
pub const DEFAULT_WIDTH: u32 = 650;

/// Default login popup height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1000;

const FIXED_FEATURES: [&str; 8] = [
    "personalbar=no",
    "toolbar=no",
    "scrollbars=yes",
    "resizable=yes",
    "directories=no",
    "location=no",
    "menubar=no",
    "titlebar=no",
];

/// Size and position of a login popup.
///
/// A missing `left` or `top` centres the popup on that axis, provided the
/// screen is larger than the popup; otherwise the popup sits at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Distance from the left edge of the screen.
    pub left: Option<u32>,
    /// Distance from the top edge of the screen.
    pub top: Option<u32>,
}

impl WindowGeometry {
    /// A centred popup of the given size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            left: None,
            top: None,
        }
    }

    /// Place the popup at a fixed position.
    #[must_use]
    pub const fn at(mut self, left: u32, top: u32) -> Self {
        self.left = Some(left);
        self.top = Some(top);
        self
    }

    /// Resolve the `(left, top)` position on `screen`.
    #[must_use]
    pub fn position_on(&self, screen: ScreenSize) -> (u32, u32) {
        let left = self
            .left
            .unwrap_or_else(|| centre(screen.width, self.width));
        let top = self
            .top
            .unwrap_or_else(|| centre(screen.height, self.height));
        (left, top)
    }

    /// The feature string passed to the host's `open`.
    #[must_use]
    pub fn features_on(&self, screen: ScreenSize) -> String {
        let (left, top) = self.position_on(screen);
        let mut features = vec![
            format!("width={}", self.width),
            format!("height={}", self.height),
            format!("left={left}"),
            format!("top={top}"),
        ];
        features.extend(FIXED_FEATURES.iter().map(ToString::to_string));
        features.join(",")
    }
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Offset centring `size` within `extent`, rounding half up.
fn centre(extent: u32, size: u32) -> u32 {
    if extent > size {
        (extent - size).div_ceil(2)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_popup_is_centred() {
        let geometry = WindowGeometry::default();
        assert_eq!(geometry.position_on(ScreenSize::new(1920, 1080)), (635, 40));
    }

    #[test]
    fn centring_rounds_half_up() {
        let geometry = WindowGeometry::new(650, 1000);
        assert_eq!(geometry.position_on(ScreenSize::new(1921, 1001)), (636, 1));
    }

    #[test]
    fn small_screen_pins_to_origin() {
        let geometry = WindowGeometry::default();
        assert_eq!(geometry.position_on(ScreenSize::new(640, 1000)), (0, 0));
    }

    #[test]
    fn explicit_position_wins() {
        let geometry = WindowGeometry::new(400, 300).at(10, 20);
        assert_eq!(geometry.position_on(ScreenSize::new(1920, 1080)), (10, 20));
    }

    #[test]
    fn one_axis_can_be_fixed() {
        let geometry = WindowGeometry {
            left: Some(5),
            ..WindowGeometry::new(400, 300)
        };
        assert_eq!(geometry.position_on(ScreenSize::new(1000, 1000)), (5, 350));
    }

    #[test]
    fn features_string() {
        let features = WindowGeometry::default().features_on(ScreenSize::new(1920, 1080));
        assert_eq!(
            features,
            "width=650,height=1000,left=635,top=40,personalbar=no,toolbar=no,\
             scrollbars=yes,resizable=yes,directories=no,location=no,menubar=no,titlebar=no"
        );
    }
}
