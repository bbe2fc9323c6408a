//! # docquery
//!
//! Ask natural-language questions against an uploaded document and get back
//! the single most relevant sentence with its similarity score.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌──────────┐   ┌─────────────┐
//! │ multipart │──▶│  upload   │──▶│ extract  │──▶│   session   │
//! │  parser   │   │   store   │   │ PDF/DOCX │   │ (one slot)  │
//! └───────────┘   └───────────┘   └──────────┘   └──────┬──────┘
//!                                                       │ text
//!                      question ──▶ ┌───────────────────▼──────┐
//!                                   │ retrieval: segment,      │
//!                                   │ normalize, embed, rank,  │──▶ {answer, similarity}
//!                                   │ gate                     │
//!                                   └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docq serve                                  # HTTP server on 0.0.0.0:8000
//! docq ask report.pdf "Where did the cat sit?"
//! docq extract report.pdf
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Pipeline error taxonomy |
//! | [`multipart`] | `multipart/form-data` file-part extraction |
//! | [`upload`] | On-disk upload storage |
//! | [`extract`] | Document text extraction |
//! | [`analyzer`] | Tokens, lemmas, stop-words, sentence boundaries |
//! | [`normalize`] | Text normalization ahead of embedding |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`retrieval`] | Best-sentence ranking and threshold gating |
//! | [`session`] | The process-wide loaded document |
//! | [`server`] | HTTP server |

pub mod analyzer;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod logging;
pub mod multipart;
pub mod normalize;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod upload;
