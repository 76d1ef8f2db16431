//! Arc-change notifications emitted while contracting

use serde::Serialize;
use std::sync::mpsc::Sender;

use crate::graph::VertexId;

/// One arc added to or removed from the working graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ArcChange {
    Added { from: VertexId, to: VertexId },
    Removed { from: VertexId, to: VertexId },
}

/// Receives arc deltas synchronously from [`super::Preprocessor::contract`]
pub trait ArcListener {
    fn on_arc_added(&mut self, from: VertexId, to: VertexId);

    fn on_arc_removed(&mut self, from: VertexId, to: VertexId);

    /// Vertices whose neighbour lists changed during one contraction
    fn on_vertices_updated(&mut self, _vertices: &[VertexId]) {}
}

/// Discard everything
impl ArcListener for () {
    fn on_arc_added(&mut self, _from: VertexId, _to: VertexId) {}

    fn on_arc_removed(&mut self, _from: VertexId, _to: VertexId) {}
}

/// Record every change in order
impl ArcListener for Vec<ArcChange> {
    fn on_arc_added(&mut self, from: VertexId, to: VertexId) {
        self.push(ArcChange::Added { from, to });
    }

    fn on_arc_removed(&mut self, from: VertexId, to: VertexId) {
        self.push(ArcChange::Removed { from, to });
    }
}

/// Stream changes to a consumer thread; a dropped receiver is ignored
impl ArcListener for Sender<ArcChange> {
    fn on_arc_added(&mut self, from: VertexId, to: VertexId) {
        if self.send(ArcChange::Added { from, to }).is_err() {
            tracing::trace!(from, to, "arc change receiver gone");
        }
    }

    fn on_arc_removed(&mut self, from: VertexId, to: VertexId) {
        if self.send(ArcChange::Removed { from, to }).is_err() {
            tracing::trace!(from, to, "arc change receiver gone");
        }
    }
}

impl<L: ArcListener + ?Sized> ArcListener for &mut L {
    fn on_arc_added(&mut self, from: VertexId, to: VertexId) {
        (**self).on_arc_added(from, to)
    }

    fn on_arc_removed(&mut self, from: VertexId, to: VertexId) {
        (**self).on_arc_removed(from, to)
    }

    fn on_vertices_updated(&mut self, vertices: &[VertexId]) {
        (**self).on_vertices_updated(vertices)
    }
}
