//! Generated gRPC protocol types (`proto/items.proto`).

tonic::include_proto!("items");

pub use health_check_response::ServingStatus;
