//! Per-task worker: prompt, query, clean, persist

use std::sync::Arc;
use serde_json::{json, Map, Value};

use shared::{run_debug, AnalysisType, ApiFailure, Task};
use crate::context::DispatchContext;
use crate::core::{clean_functions_response, clean_probability_response, EXPECTED_FUNCTIONS};
use crate::error::{DispatchError, DispatchResult};
use crate::services::write_embedding;
use crate::types::TaskPayload;

/// Run one task end to end against the shared context
pub async fn process_task(ctx: Arc<DispatchContext>, task: Task) -> DispatchResult<TaskPayload> {
    match task.analysis_type {
        AnalysisType::Functions => process_functions(&ctx, &task).await,
        AnalysisType::Probabilities => process_probability(&ctx, &task).await,
    }
}

async fn query(ctx: &DispatchContext, task: &Task) -> DispatchResult<String> {
    let model = ctx.model(task)?;
    let prompt = ctx.prompts().render(task)?;
    run_debug!("Querying {} ({}) for {}", model.name, model.model_id, task);
    ctx.provider(model.provider)?.generate(model.model_id, &prompt).await
}

async fn process_functions(ctx: &DispatchContext, task: &Task) -> DispatchResult<TaskPayload> {
    let model = ctx.model(task)?;
    let response = query(ctx, task).await?;

    let functions = clean_functions_response(&response);
    if functions.len() < EXPECTED_FUNCTIONS {
        return Err(DispatchError::Provider {
            provider: model.provider,
            reason: ApiFailure::MalformedResponse(format!(
                "expected {EXPECTED_FUNCTIONS} functions, found {}",
                functions.len()
            )),
        });
    }

    let embedding = ctx.embeddings_for(model)?.embed(&functions.join(", ")).await?;

    let paths = ctx.paths();
    ctx.store()
        .merge(&paths.query_document(task), task.model.clone(), Value::String(response.clone()))
        .await?;
    ctx.store()
        .merge(&paths.cleaned_document(task), task.model.clone(), json!(functions))
        .await?;
    write_embedding(&paths.embedding_table(task), &task.region, &embedding).await?;

    Ok(TaskPayload::Functions {
        response,
        functions,
        embedding_dimensions: embedding.len(),
    })
}

async fn process_probability(ctx: &DispatchContext, task: &Task) -> DispatchResult<TaskPayload> {
    let function = task.function.clone().ok_or_else(|| DispatchError::Prompt {
        message: format!("Task {task} has no function to score"),
    })?;

    let response = query(ctx, task).await?;
    let probability = clean_probability_response(&response);

    let mut by_model = Map::new();
    by_model.insert(task.model.clone(), json!(probability));
    ctx.store()
        .merge(&ctx.paths().query_document(task), function.clone(), Value::Object(by_model))
        .await?;

    Ok(TaskPayload::Probability { function, probability })
}
