//! Card form domain model
//!
//! - **Value Objects**: InstanceId, FieldValue, CheckboxItem
//! - **Aggregates**: FormSchema (one per card instance) holding FieldDefinitions
//! - **Domain Events**: FormEvent

pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::*;
pub use events::*;
pub use value_objects::*;
