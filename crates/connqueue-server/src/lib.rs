//! # `connqueue-server`
//!
//! A static-file HTTP/1.0 server: one thread accepts connections into a
//! [`connqueue::BoundedConnectionQueue`], a fixed pool of workers answers
//! `GET` requests from a serve directory, and Ctrl+C or SIGTERM drains the
//! queue before exiting.

pub mod server;
