//! # RankCentral
//!
//! Pairwise document comparison and ranking with LLM-evaluated, weighted
//! criteria.
//!
//! RankCentral extracts text from PDF documents, compares them pairwise by
//! asking an LLM to score each pair against a weighted criteria set, and
//! ranks the full set with a merge sort driven by those comparisons. Each
//! run is saved as a report with per-comparison records and a downloadable
//! CSV bundle.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │   PDFs   │──▶│  Criteria   │──▶│ Pairwise   │──▶│  SQLite  │
//! │ extract  │   │ normalize  │   │ merge sort │   │ reports  │
//! └──────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                                                      │
//!                                   ┌──────────────────┤
//!                                   ▼                  ▼
//!                             ┌──────────┐       ┌──────────┐
//!                             │   CLI    │       │   HTTP   │
//!                             │(rankctl) │       │  (JSON)  │
//!                             └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rankctl init                          # create database
//! rankctl criteria                      # show default criteria
//! rankctl compare ./proposals           # rank a folder of PDFs
//! rankctl reports                       # list saved reports
//! rankctl export <id>                   # download CSV bundle
//! rankctl serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`criteria`] | Criteria sets and weight normalization |
//! | [`extract`] | PDF text extraction |
//! | [`prompt`] | LLM prompt assembly |
//! | [`evaluator`] | OpenAI evaluation calls and verdict parsing |
//! | [`compare`] | Weighted pairwise comparison |
//! | [`ranking`] | Merge-sort ranking over pairwise comparisons |
//! | [`report`] | CSV report shaping and zip bundling |
//! | [`auth`] | Password hashing and session tokens |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Report and user persistence |

pub mod auth;
pub mod compare;
pub mod config;
pub mod criteria;
pub mod db;
pub mod evaluator;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod ranking;
pub mod report;
pub mod server;
pub mod store;
