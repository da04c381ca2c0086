//! Process discovery and metrics engine: deterministic, pure computation.
//!
//! Takes an event-log table (case id, activity, timestamp, optional user),
//! groups it into traces, aggregates ID / trace / activity / transition /
//! user metrics, discovers a process graph with one of five miners, and
//! flags statistically notable nodes and edges.
//!
//! No I/O, no DB, no network; every pass is a pure function of an immutable log.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod insights;
pub mod log;
pub mod metrics;
pub mod miners;
pub mod normalize;
pub mod stats;
pub mod succession;
pub mod types;
pub mod vectorizer;

pub use config::{Algorithm, Config, OutlierRule, RawConfig, TimeUnit};
pub use engine::{Analysis, Engine};
pub use error::EngineError;
pub use graph::{Annotation, GraphExport, ProcessGraph};
pub use insights::{Deviation, GraphElement, Insight, InsightDetector, InsightMetric, Verdict};
pub use log::{EventLog, Trace};
pub use metrics::{Metrics, MetricsEngine};
pub use miners::{discover, Miner};
pub use types::{ColumnRoles, Event, Table, TraceSignature};
pub use vectorizer::CountVectorizer;
