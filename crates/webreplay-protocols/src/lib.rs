//! # webreplay protocols
//!
//! Shared data model and boundary traits for the webreplay workspace.
//! Contains only types and interface definitions - no engine behaviour.
//!
//! ## Core Types
//!
//! - [`Step`] / [`Action`] - one recorded or authored action
//! - [`SelectorSet`] - primary selector plus fallback chain
//! - [`Instruction`] - named step list with variable declarations
//! - [`ExecutionLog`] - per-run outcome record
//!
//! ## Boundary Traits
//!
//! - [`PageHandle`] - host page the engine drives
//! - [`InstructionStore`] - persistence for instructions and logs

pub mod bundle;
pub mod error;
pub mod execution;
pub mod instruction;
pub mod page;
pub mod selector;
pub mod step;
pub mod store;

pub use bundle::{BUNDLE_VERSION, InstructionBundle};
pub use error::{PageError, ReplayError, StoreError};
pub use execution::{ExecutionLog, ExecutionOutcome, ExecutionStatus, ExecutorState, StepOutcome};
pub use instruction::{Instruction, SECRET_MASK, VariableDef, VariableType, Variables};
pub use page::{
    ElementHandle, ElementState, EventSpec, Modifiers, MouseButton, OptionInfo, PageActivity,
    PageHandle, Rect,
};
pub use selector::{PositionAnchor, SelectorDescriptor, SelectorSet, SelectorStrategy};
pub use step::{Action, ClickButton, ClickContext, ClickTargetKind, Condition, FileMeta, Step};
pub use store::{InstructionFilter, InstructionStore};

pub use tokio_util::sync::CancellationToken;
