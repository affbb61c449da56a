/// Data layer: core types, loading, filtering and writing.
///
/// Architecture:
/// ```text
///  metadata .csv/.json/.parquet      scans .json/.parquet
///        │                                 │
///        ▼                                 ▼
///   ┌──────────┐                     ┌──────────┐
///   │  loader   │  → MetadataTable    │  loader   │  → ScanSet
///   └──────────┘                     └──────────┘
///        │                                 │
///        └──────────────┬──────────────────┘
///                       ▼
///                 ┌──────────┐
///                 │  filter   │  rows with a loaded scan → sensor ids
///                 └──────────┘
///                       │
///                       ▼
///                  (processing)
///                       │
///                       ▼
///                 ┌──────────┐
///                 │  writer   │  flattened CSV, one row per sensor
///                 └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
