//! CardKit Forms - interactive card field-update engine
//!
//! A card delivered to a chat carries a form schema. As users tap, type and
//! toggle, the platform calls back with loosely typed action parameters; this
//! crate locates the affected field, applies the type-specific mutation,
//! validates full submissions and exports the string-valued delta that
//! re-renders the card.
//!
//! # Layout
//!
//! - **Catalog**: closed set of field types and their value keys
//! - **Domain**: value objects (InstanceId, FieldValue, CheckboxItem), the
//!   FormSchema aggregate and its events
//! - **Store**: live schemas keyed by card instance, locked per instance
//! - **Dispatcher / Validator / Exporter**: update, required-field and
//!   delta logic
//! - **Anti-Corruption Layer**: card callback payloads in, response
//!   envelopes out
//! - **Engine**: facade tying the above to one configuration

#![warn(clippy::all)]

pub mod acl;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod error;
pub mod export;
pub mod store;
pub mod validator;

pub use acl::{CardCallback, CardCallbackResponse, InboundAction};
pub use catalog::{value_key_for, FieldType};
pub use config::{DeltaMode, EngineConfig, PresentationConfig, StoreConfig};
pub use dispatcher::{ActionParams, CardAction, FieldUpdate, UpdateDispatcher};
pub use domain::*;
pub use engine::CardFormEngine;
pub use error::*;
pub use export::{DeltaExporter, ParamMap};
pub use store::FormSchemaStore;
pub use validator::{SubmissionValidator, Verdict};
