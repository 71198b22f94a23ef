//! Byte-budgeted request batching

use super::error::BatchError;
use super::wire::{SyncOperation, SyncRequest};

/// Greedy, order-preserving splitter of sync operations
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    max_bytes: usize,
}

impl Batcher {
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Split `ops` into batches whose serialized `SyncRequest` fits the budget.
    ///
    /// Operations are appended in order until the next one would overflow,
    /// which then starts a new batch. A single operation that cannot fit even
    /// alone fails the whole split.
    pub fn split(&self, ops: Vec<SyncOperation>) -> Result<Vec<Vec<SyncOperation>>, BatchError> {
        // `{"ops":[...]}` costs the empty envelope, each op, and a comma between ops
        let envelope = serde_json::to_vec(&SyncRequest { ops: Vec::new() })?.len();

        let mut batches = Vec::new();
        let mut current: Vec<SyncOperation> = Vec::new();
        let mut current_size = envelope;

        for op in ops {
            let op_size = serde_json::to_vec(&op)?.len();
            if envelope + op_size > self.max_bytes {
                return Err(BatchError::OperationTooLarge {
                    op_id: op.op_id,
                    size: envelope + op_size,
                    budget: self.max_bytes,
                });
            }

            let separator = usize::from(!current.is_empty());
            if current_size + separator + op_size > self.max_bytes {
                batches.push(std::mem::take(&mut current));
                current_size = envelope;
            }
            current_size += usize::from(!current.is_empty()) + op_size;
            current.push(op);
        }

        if !current.is_empty() {
            batches.push(current);
        }
        tracing::debug!(
            "Split sync operations into {} batches (budget {} bytes)",
            batches.len(),
            self.max_bytes
        );
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OpType;
    use crate::sync::wire::NotePayload;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn op(id: &str, text_len: usize) -> SyncOperation {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        SyncOperation {
            op_id: id.to_string(),
            op_type: OpType::Create,
            note: NotePayload {
                id: format!("note-{id}"),
                text: "x".repeat(text_len),
                is_pinned: false,
                tags: vec![],
                created_at: at,
                updated_at: at,
                deleted_at: None,
            },
            media: vec![],
        }
    }

    fn request_size(ops: &[SyncOperation]) -> usize {
        serde_json::to_vec(&SyncRequest { ops: ops.to_vec() })
            .unwrap()
            .len()
    }

    #[test]
    fn split_preserves_order_and_respects_budget() {
        let ops: Vec<_> = (0..40)
            .map(|i| op(&format!("op{i}"), (i * 37) % 300))
            .collect();
        let largest = ops.iter().map(|op| request_size(std::slice::from_ref(op))).max().unwrap();

        for budget in [largest, largest + 1, largest * 2, largest * 5, 1 << 20] {
            let batches = Batcher::new(budget).split(ops.clone()).unwrap();
            for batch in &batches {
                assert!(!batch.is_empty());
                assert!(request_size(batch) <= budget, "batch over {budget}");
            }
            let flattened: Vec<_> = batches.into_iter().flatten().collect();
            assert_eq!(flattened, ops);
        }
    }

    #[test]
    fn split_is_greedy() {
        let ops: Vec<_> = (0..6).map(|i| op(&format!("op{i}"), 100)).collect();
        let budget = request_size(&ops[..2]);

        let batches = Batcher::new(budget).split(ops).unwrap();
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 2]);
        assert_eq!(request_size(&batches[0]), budget);
    }

    #[test]
    fn three_ops_over_budget_split_into_multiple_batches() {
        let ops = vec![op("a", 400), op("b", 400), op("c", 400)];
        let single = request_size(&ops[..1]);
        let budget = single + 200;
        assert!(request_size(&ops) > budget);

        let batches = Batcher::new(budget).split(ops.clone()).unwrap();
        assert!(batches.len() >= 2);
        assert!(batches.iter().all(|batch| request_size(batch) <= budget));
        assert_eq!(batches.concat(), ops);
    }

    #[test]
    fn oversized_operation_fails() {
        let ops = vec![op("small", 10), op("huge", 5_000)];
        let error = Batcher::new(1_024).split(ops).unwrap_err();
        match error {
            BatchError::OperationTooLarge { op_id, size, budget } => {
                assert_eq!(op_id, "huge");
                assert!(size > budget);
                assert_eq!(budget, 1_024);
            }
            BatchError::Serialization(error) => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(Batcher::new(100).split(Vec::new()).unwrap().is_empty());
    }
}
