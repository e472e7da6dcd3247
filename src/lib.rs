//! `liquify` - convert a database changelog to another format, keeping only
//! the changesets that apply to one target database.
//!
//! The pipeline is [`loader`] (parse and expand includes), [`filter`],
//! then a [`serializer`] writing through an [`transaction::OutputTransaction`]
//! so a failed run never leaves a partial target behind.

pub mod arguments;
pub mod cli;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod filter;
pub mod loader;
pub mod model;
pub mod parser;
pub mod reporter;
pub mod resource;
pub mod serializer;
pub mod sql;
pub mod target;
pub mod transaction;
pub mod tree;
pub mod xml;
