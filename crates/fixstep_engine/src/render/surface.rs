//! Drawable surface abstraction
//!
//! The render scheduler never talks to a graphics API. A backend implements
//! [`Surface`] and receives plain [`DrawCommand`]s between `begin_frame` and
//! `end_frame`. All transform and interpolation work is done before a
//! command is created.

use thiserror::Error;

use crate::assets::{AssetHandle, Image};
use crate::foundation::math::Vec2;

/// RGBA color, components in `[0, 1]`
pub type Color = [f32; 4];

/// Result type for surface operations
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Errors reported by a surface backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface can no longer be drawn to
    #[error("Surface lost: {0}")]
    Lost(String),

    /// Any other backend failure
    #[error("Surface backend error: {0}")]
    Backend(String),
}

/// A single drawing instruction
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Draw an image centered on `position`
    Sprite {
        /// Image to draw
        image: AssetHandle<Image>,
        /// Center in world units
        position: Vec2,
        /// Rotation in radians
        rotation: f32,
        /// Uniform scale
        scale: f32,
    },
    /// Filled axis-aligned rectangle
    Rect {
        /// Top-left corner
        position: Vec2,
        /// Width and height
        size: Vec2,
        /// Fill color
        color: Color,
    },
    /// Filled circle
    Circle {
        /// Center
        center: Vec2,
        /// Radius
        radius: f32,
        /// Fill color
        color: Color,
    },
    /// Line segment
    Line {
        /// Start point
        from: Vec2,
        /// End point
        to: Vec2,
        /// Stroke color
        color: Color,
    },
    /// Text anchored at its top-left corner
    Text {
        /// Anchor
        position: Vec2,
        /// Content
        text: String,
        /// Text color
        color: Color,
    },
}

/// Render target for one frame at a time
pub trait Surface {
    /// Prepare a new frame
    fn begin_frame(&mut self, frame: u64) -> SurfaceResult<()>;

    /// Queue a draw command for the current frame
    fn submit(&mut self, command: DrawCommand);

    /// Present the current frame
    fn end_frame(&mut self) -> SurfaceResult<()>;
}

/// Surface that discards everything
#[derive(Debug, Default)]
pub struct NullSurface {
    frames: u64,
}

impl NullSurface {
    /// Create a null surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Surface for NullSurface {
    fn begin_frame(&mut self, _frame: u64) -> SurfaceResult<()> {
        Ok(())
    }

    fn submit(&mut self, _command: DrawCommand) {}

    fn end_frame(&mut self) -> SurfaceResult<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Commands submitted during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    /// Frame number passed to `begin_frame`
    pub number: u64,
    /// Commands in submission order
    pub commands: Vec<DrawCommand>,
}

/// Surface that keeps every presented frame, for headless runs and tests
#[derive(Debug, Default)]
pub struct RecordingSurface {
    frames: Vec<RecordedFrame>,
    current: Option<RecordedFrame>,
    history_limit: Option<usize>,
}

impl RecordingSurface {
    /// Record every frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `limit` frames
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    /// Presented frames, oldest first
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Most recently presented frame
    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl Surface for RecordingSurface {
    fn begin_frame(&mut self, frame: u64) -> SurfaceResult<()> {
        if self.current.is_some() {
            return Err(SurfaceError::Backend(format!(
                "frame {frame} begun before the previous frame ended"
            )));
        }
        self.current = Some(RecordedFrame {
            number: frame,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn submit(&mut self, command: DrawCommand) {
        if let Some(frame) = self.current.as_mut() {
            frame.commands.push(command);
        }
    }

    fn end_frame(&mut self) -> SurfaceResult<()> {
        let frame = self
            .current
            .take()
            .ok_or_else(|| SurfaceError::Backend("end_frame without begin_frame".to_string()))?;
        self.frames.push(frame);
        if let Some(limit) = self.history_limit {
            if self.frames.len() > limit {
                let excess = self.frames.len() - limit;
                self.frames.drain(..excess);
            }
        }
        Ok(())
    }
}
