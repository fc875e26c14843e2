//! Viewport geometry for ad-position (above/below the fold) classification.

use serde::{Deserialize, Serialize};

/// Classification of a rendered slot relative to the visible viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdPosition {
    /// Above the fold: at least 50% of the slot area is visible.
    Atf,
    /// Below the fold.
    Btf,
}

/// A slot's bounding rectangle, in viewport-relative CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn area(&self) -> f64 {
        let width = self.right - self.left;
        let height = self.bottom - self.top;
        if width > 0.0 && height > 0.0 {
            width * height
        } else {
            0.0
        }
    }
}

/// Visible viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Geometry snapshot taken by the host when a slot finishes rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotGeometry {
    pub rect: Rect,
    pub viewport: Viewport,
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
}

impl SlotGeometry {
    /// Classifies the slot as ATF when at least half of its area intersects
    /// the visible viewport, BTF otherwise.
    #[must_use]
    pub fn ad_position(&self) -> AdPosition {
        let left = (self.rect.left + self.scroll_x).max(0.0);
        let right = (self.rect.right + self.scroll_x).min(self.viewport.width);
        let top = (self.rect.top + self.scroll_y).max(0.0);
        let bottom = (self.rect.bottom + self.scroll_y).min(self.viewport.height);

        let intersection_width = right - left;
        let intersection_height = bottom - top;
        let intersection_area = if intersection_width > 0.0 && intersection_height > 0.0 {
            intersection_width * intersection_height
        } else {
            0.0
        };

        let slot_area = self.rect.area();
        if slot_area > 0.0 && intersection_area * 2.0 >= slot_area {
            AdPosition::Atf
        } else {
            AdPosition::Btf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(rect: Rect) -> SlotGeometry {
        SlotGeometry {
            rect,
            viewport: Viewport {
                width: 1000.0,
                height: 800.0,
            },
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    #[test]
    fn slot_fully_inside_viewport_is_atf() {
        let geo = geometry(Rect {
            left: 100.0,
            top: 100.0,
            right: 400.0,
            bottom: 300.0,
        });
        assert_eq!(geo.ad_position(), AdPosition::Atf);
    }

    #[test]
    fn slot_fully_above_viewport_is_btf() {
        let geo = geometry(Rect {
            left: 100.0,
            top: -500.0,
            right: 400.0,
            bottom: -300.0,
        });
        assert_eq!(geo.ad_position(), AdPosition::Btf);
    }

    #[test]
    fn slot_exactly_half_visible_is_atf() {
        // 200px tall, bottom half cut off by the fold at y=800.
        let geo = geometry(Rect {
            left: 0.0,
            top: 700.0,
            right: 300.0,
            bottom: 900.0,
        });
        assert_eq!(geo.ad_position(), AdPosition::Atf);
    }

    #[test]
    fn slot_mostly_below_fold_is_btf() {
        let geo = geometry(Rect {
            left: 0.0,
            top: 750.0,
            right: 300.0,
            bottom: 1000.0,
        });
        assert_eq!(geo.ad_position(), AdPosition::Btf);
    }

    #[test]
    fn zero_area_slot_is_btf() {
        let geo = geometry(Rect {
            left: 10.0,
            top: 10.0,
            right: 10.0,
            bottom: 10.0,
        });
        assert_eq!(geo.ad_position(), AdPosition::Btf);
    }

    #[test]
    fn ad_position_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&AdPosition::Atf).unwrap(),
            "\"ATF\""
        );
        assert_eq!(
            serde_json::to_string(&AdPosition::Btf).unwrap(),
            "\"BTF\""
        );
    }
}
