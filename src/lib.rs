//! Waxworks - batch queue engine for a music collection platform.
//!
//! One dispatch engine drives every deferred-work domain (album
//! enrichment, story generation, social posting) through a shared
//! queue table with lease-based claiming, retry ceilings and
//! dedup-key enforcement.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod models;
pub mod queue;
pub mod repository;
pub mod server;
pub mod services;
