/*
* Routine endpoints: comment directives, route binding, calls and dispatch.
*/

pub mod binder;
pub mod call;
pub mod directive;
pub mod dispatcher;
pub mod metadata;

pub use binder::{EndpointDescriptor, EndpointTable};
pub use dispatcher::{DispatchError, Dispatcher};
pub use metadata::RoutineMetadata;
