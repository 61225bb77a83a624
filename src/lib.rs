// service-base - shared building blocks for instrument-control services
//
// Three unrelated conveniences live here: scoped database sessions
// (InfluxDB v1/v2/v3, PostgreSQL) configured from YAML files or environment
// variables, the Ionizer interface that mirrors attribute changes of a
// service object to the Ionizer control system, and logging initialization.

pub mod database;
pub mod ionizer;
pub mod logging;
