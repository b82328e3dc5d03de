use crate::core::state::AppState;
use crate::db::types::QuestionSource;
use crate::services::lifecycle;

/// Batch width for bulk analysis. Bounds concurrent load on the external
/// analyzer; batch-to-batch progression is sequential backpressure, not a
/// performance knob.
pub(crate) const ANALYSIS_BATCH_SIZE: usize = 3;

/// Fan a batch of questions into the analysis pipeline and return
/// immediately. Item failures are handled inside the pipeline; nothing is
/// surfaced to the caller.
pub(crate) fn dispatch_bulk(state: &AppState, items: Vec<(QuestionSource, String)>) {
    if items.is_empty() {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        run_batches(&state, items).await;
    });
}

/// Process `items` in fixed-size batches preserving input order: all items
/// of a batch run concurrently and every one settles before the next batch
/// starts.
pub(crate) async fn run_batches(state: &AppState, items: Vec<(QuestionSource, String)>) {
    let total = items.len();
    tracing::info!(total, batch_size = ANALYSIS_BATCH_SIZE, "Dispatching bulk analysis");

    for batch in items.chunks(ANALYSIS_BATCH_SIZE) {
        let mut handles = Vec::with_capacity(batch.len());

        for (source, question_id) in batch.iter().cloned() {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                lifecycle::analyze_question(&state, source, &question_id).await
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Bulk analysis item failed")
                }
                Err(err) => {
                    tracing::error!(error = %err, "Bulk analysis task panicked or was cancelled")
                }
            }
        }
    }

    tracing::info!(total, "Bulk analysis dispatch completed");
}
