//! Hosted graph runtime abstraction and client.
//!
//! The runtime is an external LangGraph Platform deployment reached over its
//! HTTP API; this module only creates runs and reads their final output.

mod langgraph;

pub use langgraph::{
    ContentBlock, ImageUrl, InputMessage, LangGraphClient, LangGraphError, RunInput, RunRequest,
};
