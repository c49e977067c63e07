//! Core library for the tabmerge-tools command line application.
//!
//! The library exposes the building blocks behind the CLI as well as the
//! integration tests. IO adapters live under [`tabmerge::tools::io`], data
//! representations inside [`tabmerge::tools::model`], the key index and merge
//! engine in [`tabmerge::tools::index`] and [`tabmerge::tools::merge`], and the
//! file-level orchestration under [`tabmerge::tools::sync`].

pub mod tabmerge;

pub use tabmerge::tools::{
    Result, ToolError, config, convert, error, export, index, io, merge, model, sync,
};
