//! Request definitions and the builder that turns them into transport-ready
//! requests.

mod builder;
mod definition;

pub use builder::{build, encode_component, resolve_url, FinalFormField, FinalRequest, RequestBody};
pub use definition::{Body, FormField, FormFieldKind, KeyValue, RequestDefinition};
