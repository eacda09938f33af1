//! Comment crawler library.
//!
//! Crawls series, episodes and reader comments from a web-comic platform's
//! GraphQL API into SQLite, skipping work the store already holds, and
//! serves the results plus LLM-backed analysis over a JSON API.

#![allow(clippy::needless_raw_string_hashes)]

pub mod analysis;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod db;
pub mod llm;
pub mod remote;
pub mod web;
