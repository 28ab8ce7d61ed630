//! Rendering system
//!
//! Backend-agnostic frame rendering: the [`RenderScheduler`] walks every
//! renderable component once per driver tick and the components turn
//! interpolated simulation state into [`DrawCommand`]s on a [`Surface`].

pub mod scheduler;
pub mod surface;

pub use scheduler::{RenderContext, RenderReport, RenderScheduler};
pub use surface::{
    Color, DrawCommand, NullSurface, RecordedFrame, RecordingSurface, Surface, SurfaceError, SurfaceResult,
};

use thiserror::Error;

use crate::ecs::CallbackFailure;

/// Errors that end a render pass
#[derive(Error, Debug)]
pub enum RenderError {
    /// The surface failed to begin or present the frame
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// A renderable callback failed under the abort policy
    #[error(transparent)]
    Callback(#[from] CallbackFailure),
}
