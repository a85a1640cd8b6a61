pub mod dispatcher;
pub mod filter;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use filter::{FunctionFilter, ProviderFilterConfig};
pub use registry::{ToolHandler, ToolRegistry};
