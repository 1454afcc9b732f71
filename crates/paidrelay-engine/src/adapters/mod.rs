pub mod memory;

pub use memory::{InMemoryNode, InvoiceState, NodeCall, Operation};
