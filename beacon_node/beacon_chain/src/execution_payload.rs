//! The execution-engine seam.
//!
//! The JSON-RPC client is an external collaborator; the chain only needs
//! the two calls that gate block import and head updates.

use types::ExecutionBlockHash;

/// The engine's verdict on a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadStatus {
    Valid,
    Invalid {
        latest_valid_hash: Option<ExecutionBlockHash>,
    },
    /// The engine is still syncing; the block is imported optimistically.
    Syncing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine could not be reached; retriable.
    Unreachable(String),
}

pub trait ExecutionEngine: Send + Sync {
    /// `engine_newPayload`: submit a payload for validation.
    fn new_payload(
        &self,
        execution_block_hash: ExecutionBlockHash,
    ) -> Result<PayloadStatus, EngineError>;

    /// `engine_forkchoiceUpdated`: inform the engine of the current head,
    /// safe and finalized execution blocks.
    fn forkchoice_updated(
        &self,
        head_block_hash: ExecutionBlockHash,
        safe_block_hash: ExecutionBlockHash,
        finalized_block_hash: ExecutionBlockHash,
    ) -> Result<PayloadStatus, EngineError>;
}

/// Engine double that declares every payload valid. Used in tests and for
/// pre-merge configurations.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValidEngine;

impl ExecutionEngine for AlwaysValidEngine {
    fn new_payload(
        &self,
        _execution_block_hash: ExecutionBlockHash,
    ) -> Result<PayloadStatus, EngineError> {
        Ok(PayloadStatus::Valid)
    }

    fn forkchoice_updated(
        &self,
        _head_block_hash: ExecutionBlockHash,
        _safe_block_hash: ExecutionBlockHash,
        _finalized_block_hash: ExecutionBlockHash,
    ) -> Result<PayloadStatus, EngineError> {
        Ok(PayloadStatus::Valid)
    }
}
