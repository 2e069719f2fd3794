//! Random saga generation and on-disk saga sets.
//!
//! Sagas model command/response round trips: every task is a processing
//! request, an externally-bound wait, and a processing response, with
//! durations drawn uniformly from configurable ranges. Generated sets can
//! be exported to JSON and read back, so the same workload can feed many
//! simulation campaigns.

use rand::Rng;
use sim_core::{SimError, SimpleSaga, SystemOperation, Task};
use sim_time::{Duration, TimeError};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for generation and saga-store operations.
pub type Result<T> = std::result::Result<T, GenError>;

/// Errors raised while generating or persisting saga sets.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("saga sets must request at least one task per saga")]
    EmptyTaskRange,

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Duration distributions for generated sagas.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Inclusive range of tasks per saga.
    pub tasks_per_saga: (usize, usize),
    /// Half-open request duration range.
    pub request: (Duration, Duration),
    /// Half-open wait duration range.
    pub wait: (Duration, Duration),
    /// Half-open response duration range.
    pub response: (Duration, Duration),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            tasks_per_saga: (3, 10),
            request: (Duration::from_millis(1), Duration::from_millis(7)),
            wait: (Duration::from_millis(50), Duration::from_millis(700)),
            response: (Duration::from_millis(2), Duration::from_millis(10)),
        }
    }
}

/// Generate one saga: a uniformly-sized run of request/wait/response tasks.
pub fn generate_saga<R: Rng + ?Sized>(rng: &mut R, config: &GeneratorConfig) -> Result<SimpleSaga> {
    let (min_tasks, max_tasks) = config.tasks_per_saga;
    if min_tasks == 0 || min_tasks > max_tasks {
        return Err(GenError::EmptyTaskRange);
    }
    let task_count = rng.random_range(min_tasks..=max_tasks);
    let tasks = (0..task_count)
        .map(|_| generate_command(rng, config))
        .collect::<Result<Vec<Task>>>()?;
    Ok(SimpleSaga::new(tasks, format!("saga-{}", Uuid::new_v4())))
}

/// Generate a whole saga set.
pub fn generate_sagas<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    config: &GeneratorConfig,
) -> Result<Vec<SimpleSaga>> {
    let sagas = (0..count)
        .map(|_| generate_saga(rng, config))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(count, "generated saga set");
    Ok(sagas)
}

fn generate_command<R: Rng + ?Sized>(rng: &mut R, config: &GeneratorConfig) -> Result<Task> {
    let command_id = Uuid::new_v4();
    let request = SystemOperation::processing(
        format!("HTTP request[{command_id}]"),
        Duration::rand_between_with(rng, config.request.0, config.request.1)?,
    )?;
    let wait = SystemOperation::waiting(
        format!("wait for HTTP response[{command_id}]"),
        Duration::rand_between_with(rng, config.wait.0, config.wait.1)?,
    )?;
    let response = SystemOperation::processing(
        format!("HTTP response[{command_id}]"),
        Duration::rand_between_with(rng, config.response.0, config.response.1)?,
    )?;
    Ok(Task::new(
        vec![request, wait, response],
        format!("command[{command_id}]"),
    )?)
}

/// Write a saga set as pretty JSON, creating parent directories as needed.
pub fn export_sagas(path: &Path, sagas: &[SimpleSaga]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialised = serde_json::to_string_pretty(sagas)?;
    fs::write(path, serialised)?;
    tracing::info!(path = %path.display(), count = sagas.len(), "exported saga set");
    Ok(())
}

/// Read a saga set back from JSON.
pub fn import_sagas(path: &Path) -> Result<Vec<SimpleSaga>> {
    let contents = fs::read_to_string(path)?;
    let sagas: Vec<SimpleSaga> = serde_json::from_str(&contents)?;
    tracing::info!(path = %path.display(), count = sagas.len(), "imported saga set");
    Ok(sagas)
}
