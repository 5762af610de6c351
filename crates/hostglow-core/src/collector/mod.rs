//! Source readers for Linux host metrics.
//!
//! Each reader covers one OS text interface (`/proc/loadavg`,
//! `/proc/meminfo`, `/proc/uptime`, `/proc/net/dev`, `/proc/diskstats`,
//! thermal zones, GPU sensors) and returns typed [`Sample`]s. All
//! filesystem access goes through the [`FileSystem`] trait and external
//! commands through [`CommandRunner`], so every reader can run against the
//! in-memory mocks on non-Linux hosts and in tests.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     SourceReader                       │
//! │  loadavg  meminfo  uptime  netdev  diskstats  thermal  │
//! │                        gpu                             │
//! └───────────────┬───────────────────────┬────────────────┘
//!                 │                       │
//!          ┌──────▼──────┐         ┌──────▼────────┐
//!          │ FileSystem  │ (trait) │ CommandRunner │ (trait)
//!          └──────┬──────┘         └──────┬────────┘
//!           RealFs / MockFs      RealCommand / MockCommand
//! ```

pub mod mock;
pub mod parser;
pub mod sources;
pub mod traits;

pub use mock::{MockCommand, MockFs};
pub use parser::ParseError;
pub use sources::{ReadError, Sample, SampleKind, SharedReader, SourceReader, build_readers};
pub use traits::{CommandRunner, FileSystem, RealCommand, RealFs};
