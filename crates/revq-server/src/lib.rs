//! HTTP gateway for the revq answering pipeline.

pub mod gateway;
