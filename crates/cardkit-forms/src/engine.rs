//! Card form engine facade
//!
//! Wires the schema store, dispatcher, validator and exporter together and
//! answers platform callbacks. Every callback yields a response; failures
//! become an error text on the card.

use crate::acl::{CardCallback, CardCallbackResponse, InboundAction};
use crate::config::EngineConfig;
use crate::dispatcher::{CardAction, UpdateDispatcher};
use crate::domain::{FieldDefinition, FieldValue, FormEvent, FormSchema, InstanceId};
use crate::error::{FormsError, Result};
use crate::export::{DeltaExporter, ParamMap};
use crate::store::FormSchemaStore;
use crate::validator::{SubmissionValidator, Verdict};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CardFormEngine {
    store: Arc<FormSchemaStore>,
    dispatcher: UpdateDispatcher,
    validator: SubmissionValidator,
    exporter: DeltaExporter,
    config: EngineConfig,
}

impl CardFormEngine {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(FormSchemaStore::new(config.store.clone()));
        Self {
            dispatcher: UpdateDispatcher::new(Arc::clone(&store), config.enforce_option_bounds),
            validator: SubmissionValidator::new(config.enforce_option_bounds),
            exporter: DeltaExporter::new(config.presentation.clone(), config.delta_mode),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<FormSchemaStore> {
        &self.store
    }

    pub fn exporter(&self) -> &DeltaExporter {
        &self.exporter
    }

    /// Register the schema of a newly sent card under a fresh id
    pub fn register_card(&self, schema: FormSchema) -> InstanceId {
        let id = InstanceId::generate();
        self.register_card_with_id(id.clone(), schema);
        id
    }

    /// Register under a caller-chosen id, replacing any previous schema
    pub fn register_card_with_id(&self, id: InstanceId, schema: FormSchema) {
        let fields = schema.fields().len();
        if self.store.insert(id.clone(), schema).is_some() {
            warn!(instance = %id, "card instance re-registered, previous schema replaced");
        }
        info!(instance = %id, fields, "card registered");
    }

    /// Param map delivered with the card when it is first sent
    pub fn initial_delta(&self, id: &InstanceId) -> Result<ParamMap> {
        self.store
            .with_schema(id, |schema| Ok(self.exporter.form_delta(schema)))
    }

    /// Apply one field action; see [`UpdateDispatcher::apply_update`]
    pub fn apply_update(&self, action: &CardAction) -> Result<FieldDefinition> {
        self.update_with_delta(action).map(|(field, _)| field)
    }

    /// Apply one field action and export the re-render delta under the same lock
    pub fn update_with_delta(&self, action: &CardAction) -> Result<(FieldDefinition, ParamMap)> {
        let id = &action.instance_id;
        self.store.with_schema(id, |schema| {
            let field = self.dispatcher.apply_to(schema, action)?;
            let delta = self.exporter.update_delta(schema, &field);
            log_events(id, schema.take_events());
            Ok((field, delta))
        })
    }

    /// Validate a full submission.
    ///
    /// An accepted submission marks the stored form submitted when the
    /// instance is still live; validation itself needs no stored state.
    pub fn submit(&self, id: &InstanceId, submitted: &[Value]) -> Result<Verdict> {
        let verdict = self.validator.validate(submitted).map_err(|e| {
            warn!(instance = %id, error = %e, "submission rejected");
            e
        })?;

        let recorded = self.store.with_schema(id, |schema| {
            if verdict.is_satisfied() {
                schema.mark_submitted();
            } else {
                schema.record_rejection(verdict.missing_labels.clone());
            }
            log_events(id, schema.take_events());
            Ok(())
        });
        if let Err(FormsError::InstanceNotFound(_)) = recorded {
            debug!(instance = %id, "submission for an instance no longer stored");
        }

        if verdict.is_satisfied() {
            info!(instance = %id, "submission accepted");
        } else {
            warn!(instance = %id, missing = ?verdict.missing_labels, "required fields missing");
        }
        Ok(verdict)
    }

    /// Copy a submitted `{name: value}` map into the stored field values.
    ///
    /// Unknown names and values that do not decode for the field's type are
    /// skipped. Returns the number of fields that changed.
    pub fn merge_submitted_values(&self, id: &InstanceId, values: &Map<String, Value>) -> Result<usize> {
        self.store.with_schema(id, |schema| {
            let mut merged = 0;
            for (name, raw) in values {
                let Some(field) = schema.field_mut(name) else {
                    warn!(instance = %id, field = %name, "submitted value for unknown field");
                    continue;
                };
                let value = match FieldValue::decode(field.field_type, raw) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(instance = %id, field = %name, error = %e, "skipping submitted value");
                        continue;
                    }
                };
                if field.value() != value.as_ref() {
                    field.set_value(value)?;
                    schema.record_update(name);
                    merged += 1;
                }
            }
            log_events(id, schema.take_events());
            Ok(merged)
        })
    }

    /// Answer a platform callback; never fails
    pub fn handle_callback(&self, callback: &CardCallback) -> CardCallbackResponse {
        let delta = match callback.route() {
            Ok(InboundAction::Update(action)) => match self.update_with_delta(&action) {
                Ok((_, delta)) => delta,
                Err(e) => {
                    warn!(instance = %action.instance_id, field = %action.field_name, error = %e, "card action failed");
                    self.exporter.service_error_delta()
                }
            },
            Ok(InboundAction::Submit { instance_id, fields }) => {
                match self.submit(&instance_id, &fields).and_then(Verdict::into_result) {
                    Ok(()) => self.exporter.submitted_delta(),
                    Err(e) => self.submission_error_delta(&instance_id, &e),
                }
            }
            Err(e) => {
                warn!(instance = %callback.out_track_id, error = %e, "unroutable card callback");
                self.exporter.service_error_delta()
            }
        };
        CardCallbackResponse::for_user(delta)
    }

    /// Sweep instances idle past the TTL
    pub fn evict_expired(&self) -> usize {
        let removed = self.store.evict_expired();
        if removed > 0 {
            info!(removed, remaining = self.store.len(), "expired card instances evicted");
        }
        removed
    }

    fn submission_error_delta(&self, id: &InstanceId, error: &FormsError) -> ParamMap {
        match error {
            FormsError::ValidationFailed { labels } => self.exporter.missing_required_delta(labels),
            FormsError::UnknownFieldType(tag) => self.exporter.unknown_type_delta(tag),
            other => {
                warn!(instance = %id, error = %other, "submission failed");
                self.exporter.service_error_delta()
            }
        }
    }
}

impl Default for CardFormEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn log_events(id: &InstanceId, events: Vec<FormEvent>) {
    for event in events {
        debug!(instance = %id, event = event.event_type(), ?event, "form event");
    }
}
