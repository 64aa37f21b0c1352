pub mod agents;
pub mod memory;
pub mod prompts;
pub mod retriever;

pub use agents::{AgentError, StudyAgents};
pub use memory::{format_history, Channel, ChatTurn, OutputTag, Role, StudyOutput};
pub use prompts::{PromptError, PromptTemplate};
pub use retriever::{build_context, Retriever};
