//! Tic-tac-toe rules, a computer opponent, and client-side synchronization
//! of online games kept in a shared document store.

pub mod board;
pub mod error;
pub mod game;
pub mod offline;
pub mod opponent;
pub mod profile;
pub mod reconcile;
pub mod remote;
pub mod term;
