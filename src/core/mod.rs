pub mod gemini;
pub mod ingest;
pub mod rate_limiter;
pub mod report;
