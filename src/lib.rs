//! # Docent
//!
//! Question answering over a directory of documents.
//!
//! Files dropped into the documents directory (or uploaded over HTTP) are
//! split into segments, embedded through a local Ollama model and stored in
//! a SQLite vector index. Questions are answered by a ReAct agent that must
//! retrieve passages from the index before it may answer, and cites them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Readiness   │──▶│  Ingestion   │──▶│ SQLite index │
//! │  gate        │   │  pipeline    │   │ (cosine)     │
//! └──────────────┘   └──────┬───────┘   └──────┬───────┘
//!                           │ events           │ nearest
//!                           ▼                  ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │ Broadcaster  │   │ ReAct agent  │
//!                    │ (replay+live)│   │ + retrieval  │
//!                    └──────┬───────┘   └──────┬───────┘
//!                           └────────┬─────────┘
//!                                    ▼
//!                          ┌───────────────────┐
//!                          │ AppContext → HTTP │
//!                          └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`readiness`] | Startup barrier for the model service |
//! | [`ollama`] | Ollama HTTP client (models, embeddings, generation) |
//! | [`embedding`] | Embedder seam and vector helpers |
//! | [`store`] | Vector index backends and the document store adapter |
//! | [`extract`] | Per-format loaders |
//! | [`chunk`] | Paragraph splitting of oversized segments |
//! | [`ingest`] | Ingestion pipeline |
//! | [`progress`] | Progress reporters |
//! | [`events`] | Replayable event broadcaster |
//! | [`tool`] | Agent tools and the retrieval tool |
//! | [`agent`] | ReAct query orchestrator |
//! | [`coordinator`] | Shared application context |
//! | [`server`] | HTTP and WebSocket surface |
//! | [`telemetry`] | Tracing setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agent;
pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod embedding;
pub mod error;
pub mod events;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod ollama;
pub mod progress;
pub mod readiness;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod tool;
