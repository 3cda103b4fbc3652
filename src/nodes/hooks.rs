//! Segment-handling hooks
//!
//! The graph calls these on the child node after it adds or removes a
//! connection, so nodes can do their own housekeeping.

use log::debug;

use crate::nodes::port::InputSocketId;
use crate::nodes::Node;

/// Trait for node-specific reactions to connection changes
pub trait SegmentHandling {
    /// Called after `socket` received a parent
    fn on_connection(&mut self, _socket: &InputSocketId) {}

    /// Called after `socket` lost its parent. Returns the index of the
    /// subparameter the node dissolved in response, if any; the graph then
    /// re-keys the sockets that followed it.
    fn on_severance(&mut self, _socket: &InputSocketId) -> Option<usize> {
        None
    }
}

impl SegmentHandling for Node {
    fn on_connection(&mut self, socket: &InputSocketId) {
        debug!("Node {} received a parent on {}", self.id, socket);
    }

    /// Subparameters only exist to hold a widget or a connection; one that
    /// has neither is dropped
    fn on_severance(&mut self, socket: &InputSocketId) -> Option<usize> {
        let (param, index) = (socket.param_name()?, socket.subparam_index()?);
        let callable = self.as_callable_mut()?;
        if callable.subparam(param, index)?.widget.is_some() {
            return None;
        }
        callable.remove_subparam(param, index)?;
        debug!("Node {} dissolved subparameter {} of '{}'", self.id, index, param);
        Some(index)
    }
}
