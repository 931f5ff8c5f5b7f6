pub mod artifact_status;
