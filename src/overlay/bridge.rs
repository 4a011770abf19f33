//! CrossSurfaceBridge - content-surface geometry to host-surface geometry
//!
//! The book renders inside its own frame; the popover renders in the host
//! page so it can sit above sibling panels. The content side reports a rect
//! in its own coordinates, the bridge offsets it by where the frame sits in
//! the host, and reads the docked side panel width at the same moment.
//! Nothing from either surface is kept after `translate` returns.

use serde::{Deserialize, Serialize};

use crate::overlay::surface::{Rect, Viewport};

/// Read-only view of the host surface
pub trait HostSurface {
    fn viewport(&self) -> Viewport;

    /// Where the content frame sits in the host. None if the frame is gone.
    fn frame_rect(&self) -> Option<Rect>;

    /// Width currently taken by a docked panel on the right edge
    fn side_panel_width(&self) -> f64;
}

/// Everything placement needs, in host coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostGeometry {
    pub anchor: Rect,
    pub viewport: Viewport,
    pub reserved_right: f64,
}

pub struct CrossSurfaceBridge;

impl CrossSurfaceBridge {
    /// Translate a rect measured inside the content frame
    pub fn translate(local: Rect, host: &dyn HostSurface) -> Option<HostGeometry> {
        let frame = host.frame_rect()?;
        Some(HostGeometry {
            anchor: local.offset(frame.left, frame.top),
            viewport: host.viewport(),
            reserved_right: host.side_panel_width().max(0.0),
        })
    }
}

/// Host described by plain values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StaticHost {
    pub viewport: Viewport,
    pub frame: Option<Rect>,
    pub side_panel_width: f64,
}

impl StaticHost {
    /// Frame filling the viewport, no side panel
    pub fn full_frame(width: f64, height: f64) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            frame: Some(Rect::new(0.0, 0.0, width, height)),
            side_panel_width: 0.0,
        }
    }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_side_panel(mut self, width: f64) -> Self {
        self.side_panel_width = width;
        self
    }
}

impl HostSurface for StaticHost {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn frame_rect(&self) -> Option<Rect> {
        self.frame
    }

    fn side_panel_width(&self) -> f64 {
        self.side_panel_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_by_frame_origin() {
        let host = StaticHost::full_frame(1200.0, 800.0)
            .with_frame(Rect::new(240.0, 56.0, 640.0, 700.0))
            .with_side_panel(320.0);
        let geometry =
            CrossSurfaceBridge::translate(Rect::new(10.0, 20.0, 30.0, 18.0), &host).unwrap();
        assert_eq!(geometry.anchor, Rect::new(250.0, 76.0, 30.0, 18.0));
        assert_eq!(geometry.viewport, Viewport::new(1200.0, 800.0));
        assert_eq!(geometry.reserved_right, 320.0);
    }

    #[test]
    fn test_missing_frame() {
        let host = StaticHost {
            viewport: Viewport::new(800.0, 600.0),
            frame: None,
            side_panel_width: 0.0,
        };
        assert!(CrossSurfaceBridge::translate(Rect::default(), &host).is_none());
    }

    #[test]
    fn test_negative_panel_width_is_ignored() {
        let host = StaticHost::full_frame(800.0, 600.0).with_side_panel(-5.0);
        let geometry = CrossSurfaceBridge::translate(Rect::default(), &host).unwrap();
        assert_eq!(geometry.reserved_right, 0.0);
    }
}
