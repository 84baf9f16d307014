//! Message marker trait and the type-erased envelope the bus carries.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Marker for types that can travel over a message bus.
///
/// Messages are opaque to the bus: only the concrete type is used for
/// routing, and a subscriber registered for `T` receives exactly the
/// messages published as `T`.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct PositionChanged { x: f64, y: f64 }
///
/// impl Message for PositionChanged {}
/// ```
pub trait Message: Any + Send + Sync + 'static {}

/// A published message shared by every subscriber it is delivered to.
#[derive(Clone)]
pub struct Envelope {
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wrap a message for delivery
    pub fn new<T: Message>(message: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            payload: Arc::new(message),
        }
    }

    /// Routing key of the wrapped message
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the wrapped message, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the payload as `T`, if that is its exact type
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub(crate) fn payload(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_ref()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type", &self.type_name)
            .finish()
    }
}
