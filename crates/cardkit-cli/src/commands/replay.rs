//! Replay command

use crate::output::OutputFormat;
use anyhow::Context;
use cardkit_forms::{
    CardCallback, CardCallbackResponse, CardFormEngine, EngineConfig, FormSchema, InstanceId, ParamMap,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Recorded session: cards as sent, then the callbacks they received
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub cards: Vec<ScenarioCard>,
    #[serde(default)]
    pub callbacks: Vec<CardCallback>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioCard {
    /// Generated when absent
    pub instance_id: Option<String>,
    pub fields: Value,
}

#[derive(Debug, Serialize)]
pub struct RegisteredCard {
    pub instance: String,
    pub initial: ParamMap,
}

#[derive(Debug, Serialize)]
pub struct ReplayStep {
    pub step: usize,
    pub instance: String,
    pub response: CardCallbackResponse,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub cards: Vec<RegisteredCard>,
    pub steps: Vec<ReplayStep>,
}

pub fn run_scenario(scenario: Scenario, config: EngineConfig) -> anyhow::Result<ReplayReport> {
    let engine = CardFormEngine::new(config);

    let mut cards = Vec::with_capacity(scenario.cards.len());
    for (i, card) in scenario.cards.into_iter().enumerate() {
        let schema = FormSchema::decode(&card.fields).with_context(|| format!("card #{}", i))?;
        let id = match card.instance_id {
            Some(raw) => InstanceId::new(raw)?,
            None => InstanceId::generate(),
        };
        engine.register_card_with_id(id.clone(), schema);
        cards.push(RegisteredCard {
            initial: engine.initial_delta(&id)?,
            instance: id.to_string(),
        });
    }

    let steps = scenario
        .callbacks
        .iter()
        .enumerate()
        .map(|(step, callback)| ReplayStep {
            step,
            instance: callback.out_track_id.clone(),
            response: engine.handle_callback(callback),
        })
        .collect();

    Ok(ReplayReport { cards, steps })
}

pub async fn handle(file: &Path, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let scenario: Scenario = super::read_json(file).await?;
    tracing::info!(
        cards = scenario.cards.len(),
        callbacks = scenario.callbacks.len(),
        "replaying scenario"
    );
    let report = run_scenario(scenario, config)?;
    format.print(&report);
    Ok(())
}
