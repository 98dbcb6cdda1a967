pub mod backend;
pub mod cipher;
pub mod config;
pub mod job;
pub mod logstream;
pub mod panel;
pub mod storage;
pub mod terminal;
pub mod validation;
pub mod vault;
