//! Views: classes, the mounted tree and the scope handlers run in
//!
//! A [`ViewClass`] is an immutable description built once. A [`ViewTree`]
//! owns every mounted instance, keyed by [`ViewId`], together with the
//! document they render into. Handlers, hooks and routed reducer results
//! receive a [`ViewScope`] for the instance they belong to.

mod class;
mod collection;
mod events;
mod scope;
mod tree;

pub use class::{EventTarget, Handler, Layout, Placement, RenderFn, Template, ViewClass, ViewClassBuilder};
pub use events::{element_value, form_values, DomEvent, Invocation};
pub use collection::ROW_VALUE_KEY;
pub use scope::ViewScope;
pub use tree::{Container, Lifecycle, ModelInput, ViewId, ViewTree, ViewUpdate};
