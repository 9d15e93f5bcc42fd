//! Transfer records and the registry that owns them.

pub mod record;
pub mod registry;

pub use record::{
    title_for, Action, AgentRef, NewTransfer, PhaseIcon, Transfer, TransferItem, TransferStats,
    TransferUpdate, INITIAL_STATUS,
};
pub use registry::{get, Registry, RegistryCommand, RegistryHandle};
