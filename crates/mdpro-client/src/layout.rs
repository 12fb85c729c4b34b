//! Resizable editor/preview split.

use mdpro_core::defaults;

/// Horizontal split between the editor (left) and the preview (right).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPane {
    ratio: f32,
    min_fraction: f32,
    dragging: bool,
}

impl Default for SplitPane {
    fn default() -> Self {
        Self::new(defaults::SPLIT_RATIO, defaults::MIN_PANE_FRACTION)
    }
}

impl SplitPane {
    /// `min_fraction` is the smallest share either pane may take, capped at one half.
    pub fn new(ratio: f32, min_fraction: f32) -> Self {
        let min_fraction = if min_fraction.is_finite() {
            min_fraction.clamp(0.0, 0.5)
        } else {
            defaults::MIN_PANE_FRACTION
        };
        let mut pane = Self {
            ratio: defaults::SPLIT_RATIO,
            min_fraction,
            dragging: false,
        };
        pane.set_ratio(ratio);
        pane
    }

    /// Share of the width given to the editor.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set the ratio, clamped to `[min, 1 - min]`. Non-finite values are ignored.
    pub fn set_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.ratio = ratio.clamp(self.min_fraction, 1.0 - self.min_fraction);
        }
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    /// Follow the pointer at `x` within a container `width` wide.
    ///
    /// Ignored unless a drag is in progress or the container has no width.
    pub fn drag_to(&mut self, x: f32, width: f32) {
        if self.dragging && width > 0.0 {
            self.set_ratio(x / width);
        }
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Editor and preview widths for a container `width` wide.
    pub fn widths(&self, width: f32) -> (f32, f32) {
        let width = width.max(0.0);
        let left = width * self.ratio;
        (left, width - left)
    }
}
