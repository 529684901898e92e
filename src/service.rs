//! Request/response scoring around a fitted model.
//!
//! A [`ScoringService`] is stateless apart from the model it captures, so it
//! can be cloned freely and handed to whatever [`ServiceHost`] publishes it.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::data::Dataset;
use crate::error::{LassoError, LassoResult};
use crate::regression::FittedModel;

pub const DEFAULT_OUTPUT_FIELD: &str = "prediction";

type Row = Map<String, Value>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestBody {
    Wrapped { rows: Vec<Row> },
    Bare(Vec<Row>),
}

#[derive(Debug, Clone)]
pub struct ScoringService {
    model: Arc<FittedModel>,
    output_field: String,
}

impl ScoringService {
    pub fn new(model: FittedModel) -> Self {
        Self {
            model: Arc::new(model),
            output_field: DEFAULT_OUTPUT_FIELD.to_string(),
        }
    }

    pub fn with_output_field(mut self, field: &str) -> Self {
        self.output_field = field.to_string();
        self
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn output_field(&self) -> &str {
        &self.output_field
    }

    /// Score row objects; field order within each row must match the model.
    pub fn score(&self, rows: &[Row]) -> LassoResult<Vec<f64>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut values = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let names: Vec<String> = row.keys().cloned().collect();
            if names != columns {
                return Err(LassoError::schema(&columns, &names));
            }
            let numeric = row
                .iter()
                .map(|(name, value)| {
                    value.as_f64().ok_or_else(|| {
                        LassoError::BadRequest(format!(
                            "row {}: field '{}' is not numeric",
                            idx, name
                        ))
                    })
                })
                .collect::<LassoResult<Vec<f64>>>()?;
            values.push(numeric);
        }

        self.model.predict(&Dataset::new(columns, values)?)
    }

    /// Answer one JSON request body with one JSON response body.
    pub fn handle(&self, body: &str) -> LassoResult<String> {
        let request: RequestBody =
            serde_json::from_str(body).map_err(|e| LassoError::BadRequest(e.to_string()))?;
        let rows = match request {
            RequestBody::Wrapped { rows } | RequestBody::Bare(rows) => rows,
        };

        let predictions = self.score(&rows)?;
        debug!("scored {} rows", predictions.len());

        let mut response = Map::new();
        response.insert(self.output_field.clone(), json!(predictions));
        Ok(Value::Object(response).to_string())
    }
}

/// Where a published service can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub location: String,
}

/// A mechanism that makes a scoring service callable.
pub trait ServiceHost {
    fn publish(&mut self, name: &str, service: ScoringService) -> LassoResult<Endpoint>;
}

/// In-process registry of published services.
#[derive(Debug, Default)]
pub struct LocalHost {
    services: HashMap<String, ScoringService>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoke(&self, name: &str, body: &str) -> LassoResult<String> {
        self.services
            .get(name)
            .ok_or_else(|| LassoError::UnknownService(name.to_string()))?
            .handle(body)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ServiceHost for LocalHost {
    fn publish(&mut self, name: &str, service: ScoringService) -> LassoResult<Endpoint> {
        if name.trim().is_empty() {
            return Err(LassoError::BadRequest("service name must not be empty".to_string()));
        }
        if self.services.insert(name.to_string(), service).is_some() {
            warn!("replacing previously published service '{}'", name);
        }
        info!("published scoring service '{}'", name);
        Ok(Endpoint {
            name: name.to_string(),
            location: format!("local://{}", name),
        })
    }
}

/// Answer one request per input line on `output`; blank lines are skipped.
///
/// A failing request yields an `{"error": ...}` line and does not stop the loop.
pub fn serve_lines<R: BufRead, W: Write>(
    host: &LocalHost,
    endpoint: &Endpoint,
    input: R,
    mut output: W,
) -> Result<usize> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match host.invoke(&endpoint.name, &line) {
            Ok(reply) => reply,
            Err(err) => {
                warn!("request rejected: {}", err);
                json!({ "error": err.to_string() }).to_string()
            }
        };
        writeln!(output, "{}", reply).context("failed to write response")?;
        answered += 1;
    }
    output.flush().context("failed to flush responses")?;
    Ok(answered)
}
