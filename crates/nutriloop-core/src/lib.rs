//! Core domain logic for nutriloop: LLM providers, prompt templates,
//! the safety and nutrition agents, the consultation flow, validators,
//! tools, and the orchestrator that drives a consultation end to end.

pub mod agent;
pub mod flow;
pub mod intake;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod state;
pub mod tools;
pub mod validate;
