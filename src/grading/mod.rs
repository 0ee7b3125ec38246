// src/grading/mod.rs
//
// Test Grading & Progression Engine.
//
// Self-contained: nothing in here touches axum or performs its own I/O.
// Persistence is abstracted behind the `store::GradingStore` trait so the
// engine can be driven by the Postgres store in production and an in-memory
// store in tests.

pub mod answer;
pub mod engine;
pub mod progression;
pub mod score;
pub mod store;
pub mod topic;
