pub mod chat_generator;
pub mod http_client;
pub mod sqlite_ledger;
pub mod template_generator;

pub use chat_generator::ChatCompletionGenerator;
pub use http_client::HttpRegistryClient;
pub use sqlite_ledger::SqliteLedger;
pub use template_generator::TemplateGenerator;
