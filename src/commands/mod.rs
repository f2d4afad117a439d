//! Command implementations
//!
//! Each command is a pure-ish async function taking the shared handles
//! (config, metadata db, provider registry) and returning a serializable
//! report; printing lives next to each command so the CLI and `--json`
//! output stay in sync.

mod ask;
mod ingest;
mod init;
mod remove;
mod status;

pub use ask::{cmd_ask, print_ask_report, AskOptions, AskReport, RetrievedChunk};
pub use ingest::{
    cmd_ingest_file, cmd_ingest_text, cmd_ingest_url, print_ingest_report, IngestOptions,
    IngestReport,
};
pub use init::cmd_init;
pub use remove::{cmd_remove, print_remove_report, RemoveReport};
pub use status::{cmd_status, print_status, DocumentSummary, StatusReport};
