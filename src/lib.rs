//! Corpus QA: document ingestion and retrieval-grounded question answering.
//!
//! Documents (PDF, image, plain text) are extracted into a page and
//! paragraph hierarchy in SQLite, chunked, embedded, and indexed. Questions
//! are answered by retrieving the nearest chunks, prompting a generative
//! model with them, and parsing its cited reply into structured rows.

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extract;
pub mod generative;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod ocr;
pub mod retrieve;
pub mod server;
pub mod store;
pub mod themes;
