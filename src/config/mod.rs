//! Configuration management for snipweave.
//!
//! There is a single configuration layer: the user-wide
//! [`GlobalConfig`] file at `~/.snipweave/config.toml`, overridable with
//! `--config` or `SNIPWEAVE_CONFIG`. The credential can also come from
//! `OPENROUTER_API_KEY`.

mod global;

pub use global::{GlobalConfig, expand_path};
