//! Request and Response models for the HTTP surface
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    CountRequest, CreateRequest, DeleteRequest, FilterInput, HistogramRequest, PageRequest,
    TopBreedsRequest, UpdateRequest,
};
pub use responses::{
    CountResponse, CreateResponse, DeleteResponse, ErrorResponse, HealthResponse,
    HistogramResponse, InvalidateResponse, PageResponse, StatsResponse, TopBreedsResponse,
    UpdateResponse,
};
