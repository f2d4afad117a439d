//! docquery: document intelligence CLI
//!
//! Ingests PDFs, images, web pages and plain text through pluggable
//! recognition providers, chunks and embeds the extracted text, and
//! answers questions over the corpus with cited sources.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod generate;
pub mod meta;
pub mod providers;
pub mod store;
