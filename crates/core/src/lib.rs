//! Chaingate Core: query contracts and the streaming execution pipeline.
//!
//! This crate turns raw request parameters into validated, typed records,
//! binds them into SQL templates and runs them against the column store,
//! returning uniform envelopes with statistics and pagination.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Contract   │──▶│ Orchestrator │──▶│   Executor   │──▶ column store
//! │  (validate)  │   │ (merge, page)│   │ (stream)     │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           │
//!                    ┌──────┴───────┐
//!                    │  Pagination  │
//!                    └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use chaingate_common::config::QueryLimits;
//! use chaingate_core::contract::{rules::NetworkIdRule, ContractBuilder, FieldSpec};
//! use chaingate_core::value::RawParams;
//!
//! let contract = ContractBuilder::new(QueryLimits::default())
//!     .field(FieldSpec::new("network", NetworkIdRule))
//!     .build()
//!     .unwrap();
//! let params = contract
//!     .validate(&RawParams::from_query_string("network=mainnet"))
//!     .unwrap();
//! assert_eq!(params.get_str("network"), Some("mainnet"));
//! ```

pub mod contract;
pub mod envelope;
pub mod executor;
pub mod orchestrator;
pub mod pagination;
pub mod sql;
pub mod value;
