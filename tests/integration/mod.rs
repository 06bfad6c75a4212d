//! Integration test suite for hive.
//!
//! These tests wire real components together: the coordinate registry,
//! state store, message queue, both delivery channels, dispatcher, and
//! activity monitor. Only the physical input surface is scripted, so the
//! suite runs without a display server or agent windows.
//!
//! # Test Categories
//!
//! - `delivery`: End-to-end dispatch, retry, escalation, and ordering
//! - `lifecycle`: Agent phase transitions and state persistence
//! - `monitoring`: Inactivity detection and dashboard reporting


mod delivery;
mod lifecycle;
mod monitoring;
